//! Early visual pathway: an eye that emits a visual stream every step, a
//! lateral geniculate nucleus that relays it, and a superior colliculus
//! that collects what arrives.
//!
//! ```text
//! eye.out.visual_stream -> lgn.in.retina
//! lgn.out.thalamus      -> sc.in.vision
//! ```

mod eye;
mod lgn;
mod probe;
mod sc;

pub use eye::{Eye, EyeArgs};
pub use lgn::Lgn;
pub use probe::Probe;
pub use sc::SuperiorColliculus;

use biosim_config::{ModuleRegistry, parse_args};

pub const EYE: &str = "neuro.eye";
pub const LGN: &str = "neuro.lgn";
pub const SUPERIOR_COLLICULUS: &str = "neuro.superior_colliculus";

/// Register the neuro module types.
pub fn register(registry: &mut ModuleRegistry) {
    registry
        .register(EYE, |args| {
            let args: EyeArgs = parse_args(EYE, args)?;
            Ok(Box::new(Eye::with_args(args)))
        })
        .register(LGN, |args| {
            parse_args::<serde_json::Map<String, serde_json::Value>>(LGN, args)?;
            Ok(Box::new(Lgn::new()))
        })
        .register(SUPERIOR_COLLICULUS, |args| {
            parse_args::<serde_json::Map<String, serde_json::Value>>(SUPERIOR_COLLICULUS, args)?;
            Ok(Box::new(SuperiorColliculus::new()))
        });
}
