use std::sync::Arc;

use bookshelf_core::{IoTaskPool, Viewport};
use bookshelf_renderer::{OverlayElement, OverlayHandle, OverlayRenderer};
use bookshelf_scene::{NodeId, PageDescriptor, PageSurfaceConfig, SceneContext};
use glam::Vec2;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::content::{Block, MarkdownSource, render_markdown};
use crate::layout::{LayoutSummary, PageSide, PageSurface, TextMetrics, layout_pages};
use crate::{Language, PageError};

/// The open book: which object, which page of content, and where its page meshes live.
#[derive(Clone, Debug, PartialEq)]
pub struct BookTarget {
    pub root: NodeId,
    pub page: PageDescriptor,
    pub surface: PageSurfaceConfig,
}

impl BookTarget {
    fn slot_path(&self, slot: usize) -> Vec<usize> {
        let mut path = self.surface.anchor_path.clone();
        path.push(slot);
        path
    }
}

struct Fetched {
    generation: u64,
    result: Result<Vec<Block>, PageError>,
}

/// Fetches a book's markdown off-thread and pours it into page overlays.
///
/// Opening shows a blank two-page spread on the first slot right away; once the
/// content arrives the spread is replaced by laid-out pages. Every new request bumps
/// a generation counter, so results for a book that was closed or re-requested in
/// the meantime are discarded.
pub struct BookService {
    source: Arc<dyn MarkdownSource>,
    io: IoTaskPool,
    language: Language,
    metrics: TextMetrics,
    target: Option<BookTarget>,
    spread: Option<OverlayHandle>,
    pages: Vec<OverlayHandle>,
    blocks: Option<Vec<Block>>,
    generation: u64,
    sender: UnboundedSender<Fetched>,
    receiver: UnboundedReceiver<Fetched>,
}

impl BookService {
    pub fn new(source: Arc<dyn MarkdownSource>, io: IoTaskPool, language: Language) -> Self {
        let (sender, receiver) = unbounded_channel();
        Self {
            source,
            io,
            language,
            metrics: TextMetrics::default(),
            target: None,
            spread: None,
            pages: Vec::new(),
            blocks: None,
            generation: 0,
            sender,
            receiver,
        }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn is_open(&self) -> bool {
        self.target.is_some()
    }

    pub fn target(&self) -> Option<&BookTarget> {
        self.target.as_ref()
    }

    /// The overlay shown while content is loading, if it is still up.
    pub fn spread(&self) -> Option<OverlayHandle> {
        self.spread
    }

    pub fn pages(&self) -> &[OverlayHandle] {
        &self.pages
    }

    /// Changing language re-fetches the open book's content.
    pub fn set_language(&mut self, language: Language) {
        if self.language == language {
            return;
        }
        log::info!("Book language set to {language}");
        self.language = language;
        if self.target.is_some() {
            self.blocks = None;
            self.fetch();
        }
    }

    pub fn open(
        &mut self,
        target: BookTarget,
        scene: &SceneContext,
        overlays: &mut OverlayRenderer,
        viewport: Viewport,
    ) -> Result<(), PageError> {
        self.close(overlays);

        let path = target.slot_path(target.surface.first_slot);
        let anchor = scene
            .graph
            .child_at_path(target.root, &path)
            .ok_or_else(|| PageError::MissingSurface {
                model: scene.graph.model_name(target.root).unwrap_or_default(),
                path,
            })?;

        let size = slot_size(scene, anchor, viewport);
        log::info!("Loading page {} at slot {}", target.page.path, target.surface.first_slot);
        self.spread = Some(overlays.add_object(
            OverlayElement::new(target.page.path.clone(), Vec2::new(size.x * 2.0, size.y)),
            anchor,
            None,
        ));
        self.target = Some(target);
        self.fetch();
        Ok(())
    }

    /// Removes every overlay of the open book. Pending fetches are abandoned.
    pub fn close(&mut self, overlays: &mut OverlayRenderer) {
        if let Some(spread) = self.spread.take() {
            overlays.remove_object(spread);
        }
        self.clear_pages(overlays);
        if self.target.take().is_some() {
            log::debug!("Book closed");
        }
        self.blocks = None;
        self.generation += 1;
    }

    /// Drains finished fetches and lays out the latest one. Call once per frame.
    pub fn poll(&mut self, scene: &SceneContext, overlays: &mut OverlayRenderer, viewport: Viewport) {
        while let Ok(fetched) = self.receiver.try_recv() {
            if fetched.generation != self.generation {
                log::debug!("Discarding abandoned page fetch {}", fetched.generation);
                continue;
            }
            match fetched.result {
                Ok(blocks) => {
                    self.blocks = Some(blocks);
                    self.relayout(scene, overlays, viewport);
                }
                Err(error) => log::error!("{error}"),
            }
        }
    }

    /// Pours the current content into the open book's page slots again, e.g. after a
    /// resize changed the slot sizes.
    pub fn relayout(
        &mut self,
        scene: &SceneContext,
        overlays: &mut OverlayRenderer,
        viewport: Viewport,
    ) -> Option<LayoutSummary> {
        let target = self.target.clone()?;
        let blocks = self.blocks.clone()?;

        if let Some(spread) = self.spread.take() {
            overlays.remove_object(spread);
        }
        self.clear_pages(overlays);

        let mut surface = OverlayPages {
            target: &target,
            scene,
            overlays,
            viewport,
            metrics: self.metrics,
            current: None,
            handles: Vec::new(),
        };
        let summary = layout_pages(&mut surface, blocks, target.surface.first_slot);
        self.pages = surface.handles;

        log::debug!("Laid out {summary:?}");
        Some(summary)
    }

    fn clear_pages(&mut self, overlays: &mut OverlayRenderer) {
        for page in self.pages.drain(..) {
            overlays.remove_object(page);
        }
    }

    fn fetch(&mut self) {
        let Some(target) = &self.target else {
            return;
        };
        self.generation += 1;
        let generation = self.generation;
        let source = self.source.clone();
        let sender = self.sender.clone();
        let language = self.language;
        let path = target.page.path.clone();

        self.io.spawn(async move {
            let result = if path.is_empty() {
                Ok(Vec::new())
            } else {
                source
                    .fetch(language, &path)
                    .await
                    .map(|markdown| render_markdown(&markdown))
            };
            let _ = sender.send(Fetched { generation, result });
        });
    }
}

/// Projected extent of the slot's own page plane. An anchor without a mesh falls
/// back to the box around its subtree.
fn slot_size(scene: &SceneContext, anchor: NodeId, viewport: Viewport) -> Vec2 {
    let corners = match scene.graph.mesh_corners(anchor) {
        Some(corners) => corners,
        None => match scene.graph.world_bounds(anchor) {
            Some(bounds) => bounds.corners(),
            None => return Vec2::ZERO,
        },
    };
    scene.camera.screen_size(&corners, viewport)
}

struct CurrentPage {
    handle: OverlayHandle,
    width: f32,
    blocks: Vec<Block>,
}

/// Pages backed by overlays anchored to the book's page meshes.
struct OverlayPages<'a> {
    target: &'a BookTarget,
    scene: &'a SceneContext,
    overlays: &'a mut OverlayRenderer,
    viewport: Viewport,
    metrics: TextMetrics,
    current: Option<CurrentPage>,
    handles: Vec<OverlayHandle>,
}

impl PageSurface for OverlayPages<'_> {
    fn open_page(&mut self, slot: usize, side: PageSide) -> Option<Vec2> {
        let anchor = self
            .scene
            .graph
            .child_at_path(self.target.root, &self.target.slot_path(slot))?;
        let size = slot_size(self.scene, anchor, self.viewport);

        let mut element = OverlayElement::new(format!("{} #{slot}", self.target.page.path), size);
        element.local_offset = side.local_offset(size.x);
        let handle = self
            .overlays
            .add_object(element, anchor, Some(side.rotation_offset()));

        self.handles.push(handle);
        self.current = Some(CurrentPage {
            handle,
            width: size.x,
            blocks: Vec::new(),
        });
        Some(size)
    }

    fn append(&mut self, block: &Block) {
        let Some(current) = &mut self.current else {
            return;
        };
        if let Some(element) = self.overlays.element_mut(current.handle) {
            element.blocks.push(block.html.clone());
            current.blocks.push(block.clone());
        }
    }

    fn remove_last(&mut self) {
        let Some(current) = &mut self.current else {
            return;
        };
        if let Some(element) = self.overlays.element_mut(current.handle) {
            element.blocks.pop();
            current.blocks.pop();
        }
    }

    fn content_height(&self) -> f32 {
        self.current.as_ref().map_or(0.0, |current| {
            self.metrics.content_height(&current.blocks, current.width)
        })
    }

    fn block_count(&self) -> usize {
        self.current.as_ref().map_or(0, |current| current.blocks.len())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use bookshelf_assets::{Aabb, Handle, MeshData, Vertex};
    use bookshelf_scene::{MeshRef, SceneNode};
    use bookshelf_core::Transform;
    use glam::{Quat, Vec3};

    use super::*;

    struct MemorySource {
        pages: HashMap<(Language, String), String>,
        calls: Mutex<Vec<(Language, String)>>,
    }

    #[async_trait]
    impl MarkdownSource for MemorySource {
        async fn fetch(&self, language: Language, path: &str) -> Result<String, PageError> {
            self.calls.lock().unwrap().push((language, path.to_owned()));
            self.pages
                .get(&(language, path.to_owned()))
                .cloned()
                .ok_or_else(|| PageError::Fetch {
                    language,
                    path: path.to_owned(),
                    message: "not found".into(),
                })
        }
    }

    fn source() -> Arc<MemorySource> {
        let paragraph = format!("{}\n\n", "lorem ipsum dolor sit amet ".repeat(6));
        let mut pages = HashMap::new();
        pages.insert(
            (Language::English, "rust.md".to_owned()),
            format!("# Rust\n\n{}", paragraph.repeat(12)),
        );
        pages.insert((Language::Portuguese, "rust.md".to_owned()), "# Livro\n\nOla".to_owned());
        Arc::new(MemorySource {
            pages,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn plane() -> MeshRef {
        let v = |x: f32, y: f32| Vertex {
            position: [x, y, 0.0],
            normal: [0.0, 0.0, 1.0],
        };
        MeshRef {
            handle: Handle::new(),
            data: Arc::new(MeshData {
                vertices: vec![v(-0.2, -0.3), v(0.2, -0.3), v(0.2, 0.3), v(-0.2, 0.3)],
                indices: vec![0, 1, 2, 0, 2, 3],
                base_color: [1.0; 4],
                bounds: Aabb {
                    min: Vec3::new(-0.2, -0.3, 0.0),
                    max: Vec3::new(0.2, 0.3, 0.0),
                },
            }),
        }
    }

    // book -> cover -> pages -> 4 page planes; content starts at slot 1
    fn book_scene() -> (SceneContext, BookTarget) {
        let mut scene = SceneContext::default();
        scene.camera.transform.translation = Vec3::new(0.0, 0.0, 2.0);
        let root = scene.graph.spawn(SceneNode::new("book"), None);
        let cover = scene.graph.spawn(SceneNode::new("cover"), Some(root));
        let holder = scene.graph.spawn(SceneNode::new("pages"), Some(cover));
        for i in 0..4 {
            let mut page = SceneNode::new(format!("page{i}"));
            page.mesh = Some(plane());
            scene.graph.spawn(page, Some(holder));
        }
        scene.graph.insert(root);
        let target = BookTarget {
            root,
            page: PageDescriptor {
                path: "rust.md".into(),
            },
            surface: PageSurfaceConfig {
                anchor_path: vec![0, 0],
                first_slot: 1,
            },
        };
        (scene, target)
    }

    async fn settle(
        book: &mut BookService,
        scene: &SceneContext,
        overlays: &mut OverlayRenderer,
        viewport: Viewport,
    ) {
        for _ in 0..100 {
            book.poll(scene, overlays, viewport);
            if !book.pages().is_empty() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn open_shows_spread_then_pages() {
        let (scene, target) = book_scene();
        let viewport = Viewport::new(800.0, 600.0);
        let mut overlays = OverlayRenderer::new();
        let mut book = BookService::new(
            source(),
            IoTaskPool(tokio::runtime::Handle::current()),
            Language::English,
        );

        book.open(target, &scene, &mut overlays, viewport).unwrap();
        let spread = book.spread().unwrap();
        let slot = overlays.element(spread).unwrap().size;
        assert!(slot.x > 0.0 && slot.y > 0.0);

        settle(&mut book, &scene, &mut overlays, viewport).await;

        assert!(book.spread().is_none());
        assert!(!overlays.contains(spread));
        assert!(book.pages().len() >= 2);
        assert_eq!(overlays.len(), book.pages().len());

        let first = overlays.element(book.pages()[0]).unwrap();
        assert_eq!(first.blocks[0], "<h1>Rust</h1>");
        assert!(first.local_offset.x < 0.0);
        let second = overlays.element(book.pages()[1]).unwrap();
        assert!(second.local_offset.x > 0.0);
    }

    #[tokio::test]
    async fn language_switch_refetches_open_book() {
        let (scene, target) = book_scene();
        let viewport = Viewport::new(800.0, 600.0);
        let mut overlays = OverlayRenderer::new();
        let source = source();
        let mut book = BookService::new(
            source.clone(),
            IoTaskPool(tokio::runtime::Handle::current()),
            Language::English,
        );
        book.open(target, &scene, &mut overlays, viewport).unwrap();
        settle(&mut book, &scene, &mut overlays, viewport).await;

        book.set_language(Language::Portuguese);
        for _ in 0..100 {
            book.poll(&scene, &mut overlays, viewport);
            let translated = book
                .pages()
                .first()
                .and_then(|page| overlays.element(*page))
                .is_some_and(|element| element.blocks[0] == "<h1>Livro</h1>");
            if translated {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert_eq!(book.pages().len(), 1);
        assert_eq!(
            source.calls.lock().unwrap().last().unwrap(),
            &(Language::Portuguese, "rust.md".to_owned())
        );
    }

    #[tokio::test]
    async fn closing_abandons_pending_fetch() {
        let (scene, target) = book_scene();
        let viewport = Viewport::new(800.0, 600.0);
        let mut overlays = OverlayRenderer::new();
        let mut book = BookService::new(
            source(),
            IoTaskPool(tokio::runtime::Handle::current()),
            Language::English,
        );
        book.open(target, &scene, &mut overlays, viewport).unwrap();
        book.close(&mut overlays);
        assert!(overlays.is_empty());

        tokio::time::sleep(Duration::from_millis(50)).await;
        book.poll(&scene, &mut overlays, viewport);
        assert!(overlays.is_empty());
        assert!(!book.is_open());
    }

    #[test]
    fn rotated_slot_keeps_its_projected_width() {
        let mut scene = SceneContext::default();
        let mut page = SceneNode::new("page");
        page.transform = Transform {
            translation: Vec3::new(0.0, 0.0, -1.0),
            ..Transform::from_rotation(Quat::from_rotation_y(60f32.to_radians()))
        };
        page.mesh = Some(plane());
        let anchor = scene.graph.spawn(page, None);
        scene.graph.insert(anchor);

        let size = slot_size(&scene, anchor, Viewport::new(800.0, 600.0));
        assert!((size.x - 142.85).abs() < 0.5, "width {}", size.x);
        assert!((size.y - 377.08).abs() < 0.5, "height {}", size.y);
    }

    #[tokio::test]
    async fn missing_surface_is_an_error() {
        let (scene, mut target) = book_scene();
        target.surface.first_slot = 40;
        let mut overlays = OverlayRenderer::new();
        let mut book = BookService::new(
            source(),
            IoTaskPool(tokio::runtime::Handle::current()),
            Language::English,
        );
        let error = book
            .open(target, &scene, &mut overlays, Viewport::new(800.0, 600.0))
            .unwrap_err();
        assert!(matches!(error, PageError::MissingSurface { .. }));
        assert!(overlays.is_empty());
    }
}
