pub mod asset;
pub mod device;
pub mod observation;
pub mod query;

pub use asset::{Asset, AssetCommand, XmlNode};
pub use device::{Category, Component, DataItem, Device, Representation};
pub use observation::{Observation, ObservationValue};
