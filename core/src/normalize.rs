//! C3 Coordinate & Action Normalizer: pure functions mapping model-space
//! coordinates to screen pixels and translating a validated `ActionEnvelope`
//! into a `PixelAction` (§4.3).

use crate::actuator::PixelAction;
use vla_stream_event::{ActionEnvelope, ActionType};

/// Optional calibration offset applied after scaling, in pixels.
#[derive(Clone, Copy, Debug, Default)]
pub struct CalibrationOffset {
    pub x: i32,
    pub y: i32,
}

/// `to_pixels(nx, ny, W, H) = (clamp(round(nx/1000*W) + offset_x, 0, W-1), ...)`.
/// `nx`/`ny` are clamped to `[0, 1000]` first (out-of-range coordinates are
/// clamped with a warning event at the call site, not here).
pub fn to_pixels(nx: u32, ny: u32, width_px: u32, height_px: u32, offset: CalibrationOffset) -> (u32, u32) {
    let nx = nx.min(1000) as f64;
    let ny = ny.min(1000) as f64;
    let w = width_px as f64;
    let h = height_px as f64;

    let px = ((nx / 1000.0 * w).round() as i64 + offset.x as i64)
        .clamp(0, width_px.saturating_sub(1) as i64) as u32;
    let py = ((ny / 1000.0 * h).round() as i64 + offset.y as i64)
        .clamp(0, height_px.saturating_sub(1) as i64) as u32;
    (px, py)
}

/// Translates a validated `ActionEnvelope` into a `PixelAction`, scaling any
/// `target`/coordinates through `to_pixels`. Returns `None` for `DONE`/`FAIL`,
/// which never reach the Actuator.
pub fn to_pixel_action(
    env: &ActionEnvelope,
    width_px: u32,
    height_px: u32,
    offset: CalibrationOffset,
) -> Option<PixelAction> {
    let target_px = env
        .target
        .map(|(nx, ny)| to_pixels(nx, ny, width_px, height_px, offset));

    match env.action_type {
        ActionType::Click => target_px.map(|(x, y)| PixelAction::Click { x, y }),
        ActionType::DoubleClick => target_px.map(|(x, y)| PixelAction::DoubleClick { x, y }),
        ActionType::RightClick => target_px.map(|(x, y)| PixelAction::RightClick { x, y }),
        ActionType::Move => target_px.map(|(x, y)| PixelAction::Move { x, y }),
        ActionType::Drag => target_px.map(|to| PixelAction::Drag { from: to, to }),
        ActionType::Type => env.text.clone().map(|text| PixelAction::Type { text }),
        ActionType::Scroll => env.amount.map(|amount| PixelAction::Scroll { amount }),
        ActionType::Key => env.keys.clone().map(|keys| PixelAction::Key { keys }),
        ActionType::Wait => Some(PixelAction::Wait {
            duration: std::time::Duration::from_millis(env.duration_ms.unwrap_or(100)),
        }),
        ActionType::Done | ActionType::Fail => None,
    }
}
