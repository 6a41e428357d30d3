pub mod pca;

pub use pca::{Pca, PcaModel};
