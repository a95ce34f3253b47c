//! ASCII VU-meter, ported from the upstream `vumeter` filter module.
//!
//! The original taps raw samples via the `aufilt` encode/decode chain and prints a bar
//! on a 100ms timer per stream. `core/call::Call` already computes the same dBov level
//! per packet and publishes it as `VuTx`/`VuRx`; this module just renders it the same
//! way the original's `audio_print_vu` did, once per event rather than on its own timer.

use std::rc::{Rc, Weak};

use event_bus::{Event, EventBus, EventSink};
use registry::{ModuleCategory, ModuleDescriptor};

/// dBov floor the meter bar is scaled against; levels at or below this render empty.
const LEVEL_MIN: f32 = -90.0;
const BAR_WIDTH: usize = 16;

fn render_bar(level_dbov: f32) -> String {
    let x = ((level_dbov - LEVEL_MIN) / -LEVEL_MIN).clamp(0.0, 1.0);
    let filled = ((BAR_WIDTH as f32) * x) as usize;
    format!("[{}{}]", "=".repeat(filled), " ".repeat(BAR_WIDTH - filled))
}

pub struct VumeterModule;

impl VumeterModule {
    /// Subscribes to `bus` and returns the handle the caller must keep alive.
    pub fn install(bus: &EventBus) -> Rc<Self> {
        let module = Rc::new(Self);
        bus.subscribe(Rc::downgrade(&module) as Weak<dyn EventSink>);
        module
    }
}

impl EventSink for VumeterModule {
    fn handle(&self, event: &Event) {
        match event {
            Event::VuTx { call, level } => {
                log::info!("vumeter: tx call={call:?} {}", render_bar(*level));
            }
            Event::VuRx { call, level } => {
                log::info!("vumeter: rx call={call:?} {}", render_bar(*level));
            }
            _ => {}
        }
    }
}

fn init(_registry: &mut registry::Registry) -> Result<(), registry::ModuleError> {
    Ok(())
}

fn close(_registry: &mut registry::Registry) {}

pub fn descriptor() -> ModuleDescriptor {
    ModuleDescriptor {
        name: "vumeter",
        category: ModuleCategory::Application,
        init,
        close,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bar_is_empty_at_floor_and_full_at_zero_dbov() {
        let empty = render_bar(LEVEL_MIN);
        assert_eq!(empty, format!("[{}]", " ".repeat(BAR_WIDTH)));

        let full = render_bar(0.0);
        assert_eq!(full, format!("[{}]", "=".repeat(BAR_WIDTH)));
    }

    #[test]
    fn dispatches_on_vu_events_only() {
        let bus = EventBus::new();
        let _module = VumeterModule::install(&bus);
        bus.publish(Event::VuTx {
            call: event_bus::CallId(1),
            level: -20.0,
        });
    }
}
