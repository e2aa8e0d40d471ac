// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    offline    = { SlotState::Offline,    false, false },
    idle       = { SlotState::Idle,       true,  true },
    busy       = { SlotState::Busy,       false, true },
    crashed    = { SlotState::Crashed,    false, true },
    restarting = { SlotState::Restarting, false, true },
    disabled   = { SlotState::Disabled,   false, false },
)]
fn slot_state_capabilities(state: SlotState, accepts: bool, usable: bool) {
    assert_eq!(state.accepts_jobs(), accepts);
    assert_eq!(state.is_usable(), usable);
}

#[test]
fn slot_state_serializes_snake_case() {
    assert_eq!(
        serde_json::to_string(&SlotState::Restarting).unwrap(),
        "\"restarting\""
    );
    assert_eq!(SlotState::Disabled.to_string(), "disabled");
}

#[test]
fn orchestrator_state_defaults_to_stopped() {
    assert_eq!(OrchestratorState::default(), OrchestratorState::Stopped);
    assert_eq!(OrchestratorState::Stopping.to_string(), "stopping");
}

#[test]
fn slot_id_is_transparent() {
    assert_eq!(serde_json::to_string(&SlotId(3)).unwrap(), "3");
    assert_eq!(SlotId(3).to_string(), "3");
}
