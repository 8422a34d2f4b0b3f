use std::collections::VecDeque;

use bookshelf_core::transform::rotation_from_degrees;
use glam::{Quat, Vec2, Vec3};

use crate::content::{Block, BlockKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageSide {
    Left,
    Right,
}

impl PageSide {
    pub fn flipped(self) -> Self {
        match self {
            PageSide::Left => PageSide::Right,
            PageSide::Right => PageSide::Left,
        }
    }

    /// Turns the content to face away from the page mesh.
    pub fn rotation_offset(self) -> Quat {
        let yaw = match self {
            PageSide::Left => 180.0,
            PageSide::Right => 0.0,
        };
        rotation_from_degrees([180.0, yaw, 0.0])
    }

    /// Half a page towards the spine's outside, in page pixels.
    pub fn local_offset(self, page_width: f32) -> Vec3 {
        let half = page_width / 2.0;
        match self {
            PageSide::Left => Vec3::new(-half, 0.0, 0.0),
            PageSide::Right => Vec3::new(half, 0.0, 0.0),
        }
    }
}

/// A stack of pages that content blocks are poured into.
pub trait PageSurface {
    /// Starts a new page on `slot`, returning its pixel size, or `None` when the
    /// book has no such slot.
    fn open_page(&mut self, slot: usize, side: PageSide) -> Option<Vec2>;
    fn append(&mut self, block: &Block);
    fn remove_last(&mut self);
    /// Height of the current page's content, in pixels.
    fn content_height(&self) -> f32;
    /// Number of blocks on the current page.
    fn block_count(&self) -> usize;
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LayoutSummary {
    pub pages: usize,
    pub placed: usize,
    pub dropped: usize,
}

/// Greedy pagination. Blocks are never split: a block that overflows moves to the
/// next slot, on the opposite side. A block too tall even for an empty page keeps
/// that page to itself.
pub fn layout_pages<S: PageSurface>(
    surface: &mut S,
    blocks: Vec<Block>,
    first_slot: usize,
) -> LayoutSummary {
    let mut queue: VecDeque<Block> = blocks.into();
    let mut summary = LayoutSummary::default();
    let mut slot = first_slot;
    let mut side = PageSide::Left;
    let mut page: Option<Vec2> = None;

    while let Some(block) = queue.pop_front() {
        let size = match page {
            Some(size) => size,
            None => match surface.open_page(slot, side) {
                Some(size) => {
                    slot += 1;
                    summary.pages += 1;
                    page = Some(size);
                    size
                }
                None => {
                    summary.dropped = queue.len() + 1;
                    log::debug!("Out of page slots at {slot}, dropping {} blocks", summary.dropped);
                    break;
                }
            },
        };

        surface.append(&block);
        if surface.content_height() <= size.y {
            summary.placed += 1;
            continue;
        }

        if surface.block_count() > 1 {
            surface.remove_last();
            queue.push_front(block);
        } else {
            log::warn!("Block taller than an empty page, keeping it alone");
            summary.placed += 1;
        }
        page = None;
        side = side.flipped();
    }

    summary
}

/// Rough text measurement for markdown blocks, good enough to paginate without a
/// layout engine.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextMetrics {
    pub font_size: f32,
    pub line_height: f32,
    /// Average glyph advance as a fraction of the font size.
    pub glyph_width: f32,
    /// Vertical gap after each block, in ems.
    pub block_margin: f32,
}

impl Default for TextMetrics {
    fn default() -> Self {
        Self {
            font_size: 16.0,
            line_height: 1.5,
            glyph_width: 0.5,
            block_margin: 1.0,
        }
    }
}

impl TextMetrics {
    pub fn block_height(&self, block: &Block, width: f32) -> f32 {
        let font = self.font_size * heading_scale(block.kind);
        let per_line = ((width / (font * self.glyph_width)).floor() as usize).max(1);

        let lines: usize = match block.kind {
            BlockKind::Rule => 0,
            BlockKind::Code => block.text.iter().map(|text| text.lines().count()).sum::<usize>().max(1),
            _ => block.text.iter().map(|text| wrapped_lines(text, per_line)).sum(),
        };

        lines as f32 * font * self.line_height + font * self.block_margin
    }

    pub fn content_height<'a>(&self, blocks: impl IntoIterator<Item = &'a Block>, width: f32) -> f32 {
        blocks
            .into_iter()
            .map(|block| self.block_height(block, width))
            .sum()
    }
}

fn heading_scale(kind: BlockKind) -> f32 {
    match kind {
        BlockKind::Heading(1) => 2.0,
        BlockKind::Heading(2) => 1.5,
        BlockKind::Heading(3) => 1.17,
        BlockKind::Heading(5) => 0.83,
        BlockKind::Heading(6) => 0.67,
        _ => 1.0,
    }
}

fn wrapped_lines(text: &str, per_line: usize) -> usize {
    let chars = text.split_whitespace().map(|w| w.chars().count() + 1).sum::<usize>();
    chars.div_ceil(per_line).max(1)
}
