// Copyright 2024-2025 Golem Cloud
//
// Licensed under the Golem Source License v1.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://license.golem.cloud/LICENSE
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::time::{SystemTime, UNIX_EPOCH};

/// Millisecond-precision wall clock, used for every timestamp on the wire.
/// All cadences and windows in this system are specified in these units.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before UNIX epoch")
        .as_millis() as u64
}

/// Tolerance for a worker clock running ahead of the conductor's. Pings
/// with a timestamp further in the future than this are clamped to `now`
/// rather than rejected outright.
pub const CLOCK_SKEW_BOUND_MILLIS: u64 = 5_000;

/// Clamp a reported timestamp to `now` if it claims to be from the future
/// beyond the tolerated skew.
pub fn clamp_to_now(reported: u64, now: u64) -> u64 {
    if reported > now + CLOCK_SKEW_BOUND_MILLIS {
        now
    } else {
        reported
    }
}
