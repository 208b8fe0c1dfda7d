//! Encoder, decoder and their composition into a variational autoencoder.

mod encoder;
mod decoder;
mod vae;

pub use encoder::StackGruEncoder;
pub use decoder::StackGruDecoder;
pub use vae::{ TeacherVae, VaeOutput };
