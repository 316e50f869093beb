//! Vibrating elements and the structures that couple them.
//!
//! Everything here is sized at construction and clamps its inputs, so the
//! audio path can call any setter without a failure case.

pub mod coupling;
pub mod modal;
pub mod waveguide;

pub use coupling::{
    BridgeCoupling, BridgeTermination, RigidBridge, SharedBridge, SympatheticBank,
    SympatheticTuning,
};
pub use modal::{ModalBank, ModalType, MAX_MODES};
pub use waveguide::WaveguideLine;
