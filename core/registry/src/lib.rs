//! Process-wide module/component registry (SPEC_FULL §4.1/§9).
//!
//! Replaces the corpus's single shared global struct with a `Registry` value that a
//! module's `init` populates and `close` tears back down — tests build their own
//! `Registry` instead of touching process globals (see SPEC_FULL §9 "process-wide
//! registries" redesign note). Binds device/codec/filter/MNAT descriptors the way
//! `core/call` and `core/ua` look them up, plus the application-module table (C13).

use std::collections::HashMap;
use std::net::SocketAddr;

use thiserror::Error;

pub use codec::CodecDescriptor;
pub use device::DeviceRegistry;

#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("module {0:?} is already loaded")]
    AlreadyLoaded(&'static str),
    #[error("module {name:?} failed to initialise: {reason}")]
    InitFailed { name: &'static str, reason: String },
}

pub type FilterFactory = fn() -> Box<dyn filter::Filter>;

/// Parameters handed to an [`MnatFactory`]; not every strategy uses every field (e.g.
/// `none` ignores `server`/`credentials`).
#[derive(Debug, Clone)]
pub struct MnatParams {
    pub server: Option<SocketAddr>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub local_rtp: SocketAddr,
    pub local_rtcp: SocketAddr,
}

pub type MnatFactory = fn(&MnatParams) -> Box<dyn mnat::MnatDriver>;

fn none_factory(params: &MnatParams) -> Box<dyn mnat::MnatDriver> {
    Box::new(mnat::none::NoneDriver::new(params.local_rtp, params.local_rtcp))
}

fn stun_factory(params: &MnatParams) -> Box<dyn mnat::MnatDriver> {
    Box::new(mnat::stun::StunDriver::new(
        params.server.expect("stun strategy requires a server address"),
    ))
}

fn turn_factory(params: &MnatParams) -> Box<dyn mnat::MnatDriver> {
    Box::new(mnat::turn::TurnDriver::new(
        params.server.expect("turn strategy requires a server address"),
        mnat::turn::TurnCredentials {
            username: params.username.clone().unwrap_or_default(),
            password: params.password.clone().unwrap_or_default(),
        },
    ))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleCategory {
    Codec,
    Filter,
    Device,
    Mnat,
    Ui,
    Application,
}

/// A statically registered module (SPEC_FULL §4.1: dynamic loading is expressed as
/// static registration in this workspace; see DESIGN.md). `init` must leave the
/// registry untouched on failure, which [`Registry::load_module`] enforces by only
/// committing the mutations `init` made once it returns `Ok`.
#[derive(Clone, Copy)]
pub struct ModuleDescriptor {
    pub name: &'static str,
    pub category: ModuleCategory,
    pub init: fn(&mut Registry) -> Result<(), ModuleError>,
    pub close: fn(&mut Registry),
}

#[derive(Clone)]
pub struct Registry {
    pub devices: DeviceRegistry,
    pub codecs: Vec<CodecDescriptor>,
    filters: HashMap<String, FilterFactory>,
    mnat: HashMap<String, MnatFactory>,
    loaded_modules: Vec<ModuleDescriptor>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            devices: DeviceRegistry::default(),
            codecs: Vec::new(),
            filters: HashMap::new(),
            mnat: HashMap::new(),
            loaded_modules: Vec::new(),
        }
    }

    /// Registry pre-populated with everything this workspace ships unconditionally:
    /// builtin synthetic devices, PCMU/PCMA/G722, and the none/stun/turn MNAT
    /// strategies (ICE is wired up directly by `core/call` since it needs a live
    /// `IceAgent`, not just a name — see `media/mnat::ice`).
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.devices = DeviceRegistry::with_builtin_drivers();
        registry.codecs = codec::builtin_codecs();
        registry.register_mnat("none", none_factory);
        registry.register_mnat("stun", stun_factory);
        registry.register_mnat("turn", turn_factory);
        registry
    }

    pub fn register_filter(&mut self, name: &str, factory: FilterFactory) {
        self.filters.insert(name.to_owned(), factory);
    }

    pub fn create_filter(&self, name: &str) -> Option<Box<dyn filter::Filter>> {
        self.filters.get(name).map(|factory| factory())
    }

    pub fn register_mnat(&mut self, name: &str, factory: MnatFactory) {
        self.mnat.insert(name.to_owned(), factory);
    }

    pub fn create_mnat(&self, name: &str, params: &MnatParams) -> Option<Box<dyn mnat::MnatDriver>> {
        self.mnat.get(name).map(|factory| factory(params))
    }

    pub fn codec_by_name(&self, name: &str) -> Option<&CodecDescriptor> {
        self.codecs.iter().find(|c| c.name == name)
    }

    /// Registers `module` exactly once, rolling back every mutation `init` made if it
    /// returns an error (SPEC_FULL §4.1: "a failed init must leave no registrations").
    pub fn load_module(&mut self, module: ModuleDescriptor) -> Result<(), ModuleError> {
        if self.loaded_modules.iter().any(|m| m.name == module.name) {
            return Err(ModuleError::AlreadyLoaded(module.name));
        }

        let checkpoint = self.clone();
        match (module.init)(self) {
            Ok(()) => {
                self.loaded_modules.push(module);
                Ok(())
            }
            Err(reason) => {
                *self = checkpoint;
                Err(ModuleError::InitFailed {
                    name: module.name,
                    reason: reason.to_string(),
                })
            }
        }
    }

    /// Unloads every module in reverse registration order (SPEC_FULL §4.1).
    pub fn unload_all_modules(&mut self) {
        while let Some(module) = self.loaded_modules.pop() {
            (module.close)(self);
        }
    }

    pub fn loaded_module_names(&self) -> Vec<&'static str> {
        self.loaded_modules.iter().map(|m| m.name).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_builtins_has_pcmu_and_sine() {
        let registry = Registry::with_builtins();
        assert!(registry.codec_by_name("PCMU").is_some());
        assert!(registry.devices.open_audio_source(
            "sine",
            device::AudioParams {
                sample_rate: 8000,
                channels: 1,
                format: device::SampleFormat::S16Le,
                ptime: std::time::Duration::from_millis(20),
            }
        ).is_ok());
    }

    fn ok_module(name: &'static str) -> ModuleDescriptor {
        ModuleDescriptor {
            name,
            category: ModuleCategory::Application,
            init: |registry| {
                registry.register_filter("noop", || {
                    struct Noop;
                    impl filter::Filter for Noop {
                        fn process(
                            &mut self,
                            _frame: &mut device::AudioFrame,
                        ) -> Result<Option<filter::FilterEvent>, filter::FilterError> {
                            Ok(None)
                        }
                    }
                    Box::new(Noop)
                });
                Ok(())
            },
            close: |registry| {
                registry.filters.remove("noop");
            },
        }
    }

    fn failing_module(name: &'static str) -> ModuleDescriptor {
        ModuleDescriptor {
            name,
            category: ModuleCategory::Application,
            init: |registry| {
                registry.register_filter("half-registered", || unreachable!());
                Err(ModuleError::InitFailed {
                    name: "x",
                    reason: "boom".into(),
                })
            },
            close: |_| {},
        }
    }

    #[test]
    fn failed_init_leaves_no_registrations() {
        let mut registry = Registry::new();
        let err = registry.load_module(failing_module("broken"));
        assert!(err.is_err());
        assert!(registry.create_filter("half-registered").is_none());
        assert!(registry.loaded_module_names().is_empty());
    }

    #[test]
    fn modules_unload_in_reverse_order() {
        let mut registry = Registry::new();
        registry.load_module(ok_module("a")).unwrap();
        registry.load_module(ok_module("b")).unwrap();

        assert_eq!(registry.loaded_module_names(), vec!["a", "b"]);
        assert!(registry.create_filter("noop").is_some());

        registry.unload_all_modules();
        assert!(registry.loaded_module_names().is_empty());
        assert!(registry.create_filter("noop").is_none());
    }

    #[test]
    fn cannot_load_the_same_module_twice() {
        let mut registry = Registry::new();
        registry.load_module(ok_module("dup")).unwrap();
        assert!(registry.load_module(ok_module("dup")).is_err());
    }
}
