use std::collections::HashMap;
use std::sync::Arc;

use bookshelf_assets::{AnimationClip, AssetScene};
use bookshelf_scene::{ClipOptions, NodeId, SceneGraph};

pub mod mixer;
pub mod sample;

pub use mixer::{AnimationMixer, ClipAction, LoopMode};

/// Called once when the mixer it was registered on finishes.
pub type OnEnd = Box<dyn FnOnce() + Send>;

struct MixerEntry {
    mixer: AnimationMixer,
    in_flight: bool,
    on_end: Option<OnEnd>,
}

/// Clip registry per model name plus one mixer per animated object.
#[derive(Default)]
pub struct AnimationService {
    clips: HashMap<String, Vec<Arc<AnimationClip>>>,
    mixers: HashMap<NodeId, MixerEntry>,
}

impl AnimationService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remembers the clips bundled with a model's asset. Assets without clips are
    /// not registered, so playing them stays a no-op.
    pub fn register_clips(&mut self, model_name: &str, asset: &AssetScene) {
        if !asset.has_animations() {
            return;
        }
        log::info!(
            "Registered {} animation clips for {model_name}",
            asset.animations.len()
        );
        self.clips.insert(
            model_name.to_owned(),
            asset.animations.iter().cloned().map(Arc::new).collect(),
        );
    }

    pub fn mixer(&self, target: NodeId) -> Option<&AnimationMixer> {
        self.mixers.get(&target).map(|entry| &entry.mixer)
    }

    pub fn is_in_flight(&self, target: NodeId) -> bool {
        self.mixers.get(&target).is_some_and(|entry| entry.in_flight)
    }

    /// Plays every clip of `model_name` on `target`.
    ///
    /// An action is only rewound when its mixer has nothing in flight or the action
    /// is paused, so re-triggering mid-animation continues from the current time.
    /// `on_end` replaces whatever callback the mixer held before.
    pub fn play(
        &mut self,
        model_name: &str,
        target: NodeId,
        options: ClipOptions,
        on_end: Option<OnEnd>,
    ) {
        log::info!("Playing animation for model {model_name}: {options:?}");
        let Some(clips) = self.clips.get(model_name) else {
            return;
        };

        let entry = self.mixers.entry(target).or_insert_with(|| {
            log::debug!("Created mixer for {model_name}");
            MixerEntry {
                mixer: AnimationMixer::new(target),
                in_flight: false,
                on_end: None,
            }
        });

        for clip in clips {
            let in_flight = entry.in_flight;
            let action = entry.mixer.clip_action(clip);

            if !in_flight || action.paused {
                action.reset();
                if options.in_reverse {
                    action.time = clip.duration;
                }
            }
            if options.hold_on_last_frame {
                action.clamp_when_finished = true;
                action.loop_mode = LoopMode::Once;
            }
            action.time_scale = if options.in_reverse { -1.0 } else { 1.0 };
            action.play();
        }
        entry.in_flight = true;

        // Detach the previous callback before attaching the new one
        entry.on_end.take();
        entry.on_end = on_end;
    }

    /// Advances every mixer. Finished callbacks run after the frame's poses are set.
    pub fn update(&mut self, delta: f32, graph: &mut SceneGraph) {
        let mut callbacks = Vec::new();

        for entry in self.mixers.values_mut() {
            let finished = entry.mixer.update(delta, graph);
            if finished == 0 {
                continue;
            }
            if entry.in_flight {
                entry.in_flight = false;
            }
            if let Some(on_end) = entry.on_end.take() {
                callbacks.push(on_end);
            }
        }

        for callback in callbacks {
            callback();
        }
    }
}
