use std::collections::HashMap;
use std::sync::Arc;

use bookshelf_assets::AnimationClip;
use bookshelf_core::transform::Transform;
use bookshelf_scene::{NodeId, SceneGraph};

use crate::sample::apply_track;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopMode {
    Once,
    Repeat,
}

/// Playback state of one clip on one mixer.
#[derive(Clone, Debug)]
pub struct ClipAction {
    clip: Arc<AnimationClip>,
    pub time: f32,
    pub time_scale: f32,
    pub paused: bool,
    pub enabled: bool,
    pub loop_mode: LoopMode,
    pub clamp_when_finished: bool,
    active: bool,
}

impl ClipAction {
    fn new(clip: Arc<AnimationClip>) -> Self {
        Self {
            clip,
            time: 0.0,
            time_scale: 1.0,
            paused: false,
            enabled: true,
            loop_mode: LoopMode::Repeat,
            clamp_when_finished: false,
            active: false,
        }
    }

    pub fn clip(&self) -> &AnimationClip {
        &self.clip
    }

    /// Back to the start: running, unpaused, time zero.
    pub fn reset(&mut self) {
        self.paused = false;
        self.enabled = true;
        self.time = 0.0;
    }

    pub fn play(&mut self) {
        self.active = true;
    }

    pub fn stop(&mut self) {
        self.active = false;
        self.reset();
    }

    /// Scheduled, enabled and not paused.
    pub fn is_running(&self) -> bool {
        self.active && self.enabled && !self.paused && self.time_scale != 0.0
    }

    // Advances time, returning true when a loop-once action just ended.
    fn advance(&mut self, delta: f32) -> bool {
        if !self.is_running() {
            return false;
        }

        let duration = self.clip.duration;
        let time = self.time + delta * self.time_scale;

        if duration <= 0.0 {
            self.time = 0.0;
            return self.finish_once();
        }

        match self.loop_mode {
            LoopMode::Repeat => {
                self.time = time.rem_euclid(duration);
                false
            }
            LoopMode::Once if time >= duration => {
                self.time = duration;
                self.finish_once()
            }
            LoopMode::Once if time <= 0.0 => {
                self.time = 0.0;
                self.finish_once()
            }
            LoopMode::Once => {
                self.time = time;
                false
            }
        }
    }

    fn finish_once(&mut self) -> bool {
        if self.loop_mode == LoopMode::Repeat {
            return false;
        }
        if self.clamp_when_finished {
            self.paused = true;
        } else {
            self.enabled = false;
        }
        true
    }

    /// Whether the action still drives its targets.
    fn influences(&self) -> bool {
        self.active && self.enabled
    }
}

/// Drives the clips of one target object. Tracks bind to descendants by node name.
pub struct AnimationMixer {
    root: NodeId,
    actions: Vec<ClipAction>,
    bindings: HashMap<String, Option<NodeId>>,
    originals: HashMap<NodeId, Transform>,
    applied: bool,
}

impl AnimationMixer {
    pub fn new(root: NodeId) -> Self {
        Self {
            root,
            actions: Vec::new(),
            bindings: HashMap::new(),
            originals: HashMap::new(),
            applied: false,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The action for `clip`, created on first use.
    pub fn clip_action(&mut self, clip: &Arc<AnimationClip>) -> &mut ClipAction {
        let index = match self
            .actions
            .iter()
            .position(|action| Arc::ptr_eq(&action.clip, clip))
        {
            Some(index) => index,
            None => {
                self.actions.push(ClipAction::new(clip.clone()));
                self.actions.len() - 1
            }
        };
        &mut self.actions[index]
    }

    pub fn existing_action(&self, clip_name: &str) -> Option<&ClipAction> {
        self.actions.iter().find(|action| action.clip.name == clip_name)
    }

    pub fn is_running(&self) -> bool {
        self.actions.iter().any(ClipAction::is_running)
    }

    /// Advances every action by `delta` seconds and poses the bound nodes.
    /// Returns how many actions finished during this step.
    pub fn update(&mut self, delta: f32, graph: &mut SceneGraph) -> usize {
        let mut finished = 0;
        for action in &mut self.actions {
            if action.advance(delta) {
                finished += 1;
            }
        }

        let influencing: Vec<usize> = (0..self.actions.len())
            .filter(|&i| self.actions[i].influences())
            .collect();

        if influencing.is_empty() {
            if self.applied {
                self.restore(graph);
            }
            return finished;
        }

        for index in influencing {
            let action = &self.actions[index];
            let time = action.time;
            let clip = action.clip.clone();
            for track in &clip.tracks {
                let Some(node) = self.bind(&track.target, graph) else {
                    continue;
                };
                graph.update_transform(node, |transform| apply_track(track, time, transform));
            }
        }
        self.applied = true;
        finished
    }

    fn bind(&mut self, name: &str, graph: &SceneGraph) -> Option<NodeId> {
        let root = self.root;
        let node = (*self
            .bindings
            .entry(name.to_owned())
            .or_insert_with(|| graph.find_by_name(root, name)))?;
        if let Some(transform) = graph.transform(node) {
            self.originals.entry(node).or_insert(transform);
        }
        Some(node)
    }

    // Puts bound nodes back in their pre-animation pose once nothing drives them.
    fn restore(&mut self, graph: &mut SceneGraph) {
        for (node, original) in &self.originals {
            graph.set_transform(*node, *original);
        }
        self.applied = false;
    }
}

#[cfg(test)]
mod tests {
    use bookshelf_assets::{Interpolation, Track, TrackValues};
    use bookshelf_scene::SceneNode;
    use glam::Vec3;

    use super::*;

    fn lid_clip() -> Arc<AnimationClip> {
        Arc::new(AnimationClip::new(
            "open",
            vec![Track {
                target: "Lid".into(),
                interpolation: Interpolation::Linear,
                times: vec![0.0, 2.0],
                values: TrackValues::Translation(vec![Vec3::ZERO, Vec3::new(0.0, 2.0, 0.0)]),
            }],
        ))
    }

    fn graph_with_lid() -> (SceneGraph, NodeId, NodeId) {
        let mut graph = SceneGraph::new();
        let root = graph.spawn(SceneNode::new("Box"), None);
        let lid = graph.spawn(SceneNode::new("Lid"), Some(root));
        (graph, root, lid)
    }

    #[test]
    fn once_with_clamp_holds_last_frame() {
        let (mut graph, root, lid) = graph_with_lid();
        let clip = lid_clip();
        let mut mixer = AnimationMixer::new(root);
        let action = mixer.clip_action(&clip);
        action.loop_mode = LoopMode::Once;
        action.clamp_when_finished = true;
        action.play();

        assert_eq!(mixer.update(1.0, &mut graph), 0);
        assert!(graph.transform(lid).unwrap().translation.abs_diff_eq(Vec3::Y, 1e-6));

        assert_eq!(mixer.update(5.0, &mut graph), 1);
        assert_eq!(graph.transform(lid).unwrap().translation, Vec3::new(0.0, 2.0, 0.0));
        assert!(!mixer.is_running());

        // Paused actions fire no further finished events
        assert_eq!(mixer.update(1.0, &mut graph), 0);
        assert_eq!(graph.transform(lid).unwrap().translation, Vec3::new(0.0, 2.0, 0.0));
    }

    #[test]
    fn unclamped_once_restores_original_pose() {
        let (mut graph, root, lid) = graph_with_lid();
        let clip = lid_clip();
        let mut mixer = AnimationMixer::new(root);
        let action = mixer.clip_action(&clip);
        action.loop_mode = LoopMode::Once;
        action.play();

        mixer.update(1.0, &mut graph);
        assert_eq!(mixer.update(2.0, &mut graph), 1);
        assert_eq!(graph.transform(lid).unwrap().translation, Vec3::ZERO);
    }

    #[test]
    fn reverse_once_ends_at_zero() {
        let (mut graph, root, lid) = graph_with_lid();
        let clip = lid_clip();
        let mut mixer = AnimationMixer::new(root);
        let action = mixer.clip_action(&clip);
        action.loop_mode = LoopMode::Once;
        action.clamp_when_finished = true;
        action.time_scale = -1.0;
        action.time = 2.0;
        action.play();

        mixer.update(0.5, &mut graph);
        assert!(
            graph
                .transform(lid)
                .unwrap()
                .translation
                .abs_diff_eq(Vec3::new(0.0, 1.5, 0.0), 1e-6)
        );
        assert_eq!(mixer.update(3.0, &mut graph), 1);
        assert_eq!(mixer.existing_action("open").unwrap().time, 0.0);
    }

    #[test]
    fn repeat_wraps_without_finishing() {
        let (mut graph, root, _) = graph_with_lid();
        let clip = lid_clip();
        let mut mixer = AnimationMixer::new(root);
        mixer.clip_action(&clip).play();

        assert_eq!(mixer.update(5.0, &mut graph), 0);
        assert!((mixer.existing_action("open").unwrap().time - 1.0).abs() < 1e-6);
        assert!(mixer.is_running());
    }

    #[test]
    fn same_clip_reuses_action() {
        let clip = lid_clip();
        let (_, root, _) = graph_with_lid();
        let mut mixer = AnimationMixer::new(root);
        mixer.clip_action(&clip).time = 1.25;
        assert_eq!(mixer.clip_action(&clip).time, 1.25);
    }
}
