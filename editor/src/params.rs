use bevy::prelude::*;
use terrain_engine::{ParamChange, ParamGroup, ParamKey, ParamValue, ParameterStore, TerrainParams};

/// The live parameter store. Mutated only through [`Parameters::apply`].
#[derive(Resource, Deref)]
pub struct Parameters(ParameterStore);

impl Parameters {
    pub fn new(params: TerrainParams) -> Self {
        Self(ParameterStore::new(params))
    }

    /// Write through the store and announce the change. Rejected values are logged.
    pub fn apply(&mut self, key: ParamKey, value: ParamValue, events: &mut EventWriter<ParamChanged>) -> bool {
        match self.0.set(key, value) {
            Ok(Some(change)) => {
                debug!("{} -> {:?}", key.name(), change.value);
                events.send(ParamChanged(change));
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!("parameter rejected: {e}");
                false
            }
        }
    }
}

#[derive(Event, Debug, Clone, Copy, PartialEq, Deref)]
pub struct ParamChanged(pub ParamChange);

impl ParamChanged {
    pub fn group(&self) -> ParamGroup {
        self.0.key.group()
    }
}

/// Whether any change this frame touched one of `groups`.
pub fn touched(events: &mut EventReader<ParamChanged>, groups: &[ParamGroup]) -> bool {
    // 读完全部事件，避免下一帧重复处理
    events.read().fold(false, |hit, ev| hit | groups.contains(&ev.group()))
}
