use bevy::prelude::*;
use terrain_engine::{ParamGroup, TickScheduler};

use crate::params::{touched, ParamChanged, Parameters};

/// 帧链状态：暂停时不再调度新的 tick
#[derive(States, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrameState {
    #[default]
    Running,
    Paused,
}

#[derive(Resource, Deref, DerefMut)]
pub struct FrameTicker(pub TickScheduler);

pub struct FrameStatePlugin;

impl Plugin for FrameStatePlugin {
    fn build(&self, app: &mut App) {
        app.init_state::<FrameState>()
            .add_systems(Update, (toggle_pause, follow_cadence))
            .add_systems(OnEnter(FrameState::Paused), |mut ticker: ResMut<FrameTicker>| {
                info!("frame chain paused");
                ticker.cancel();
            })
            .add_systems(OnExit(FrameState::Paused), |mut ticker: ResMut<FrameTicker>| {
                info!("frame chain resumed");
                ticker.resume();
            });
    }
}

pub fn toggle_pause(keys: Res<ButtonInput<KeyCode>>, state: Res<State<FrameState>>, mut next: ResMut<NextState<FrameState>>) {
    if keys.just_pressed(KeyCode::Space) {
        next.set(flipped(*state.get()));
    }
}

pub fn flipped(state: FrameState) -> FrameState {
    match state {
        FrameState::Running => FrameState::Paused,
        FrameState::Paused => FrameState::Running,
    }
}

fn follow_cadence(mut events: EventReader<ParamChanged>, params: Res<Parameters>, mut ticker: ResMut<FrameTicker>) {
    if touched(&mut events, &[ParamGroup::Render]) {
        ticker.set_cadence(params.params().render.cadence);
    }
}
