//! Stack-augmented GRU variational autoencoder for token sequences,
//! such as tokenized SMILES strings. CPU only. Few dependencies.
//!
//! # Overview
//!
//! - **Auto-grad core**: [Tensor]s hold data, [Variable]s record the
//! operations performed on them and compute gradients on demand.
//!
//! - **Stack-GRU**: A GRU whose input gets augmented with the top of a
//! differentiable stack, manipulated by soft push, pop and no-op gates.
//! See [stack_rnn].
//!
//! - **Variational autoencoder**: [TeacherVae] encodes sequences into a
//! diagonal Gaussian latent space and decodes them with teacher forcing, or
//! samples new sequences from latent vectors.
//!
//! - **Training**: KL-annealed training with a range of standard optimizers,
//! gradient clipping and binary checkpoints.
//!
//! # Examples
//!
//! Minimizing a non-linear function with the auto-grad core:
//! ```
//! use stackvae::{ ops::*, Tensor, optimize::{ Optimizer, Adam } };
//!
//! // Create trainable variables from tensors
//! let w = Tensor::randn(&[2, 8]).trained();
//! let b = Tensor::zeros(&[8]).trained();
//!
//! // Use a standard optimizer
//! let mut optimizer = Optimizer::new(0.001, Adam::default());
//!
//! for _ in 0..100 {
//!   // Track input data for compute operations to be recorded
//!   let x = Tensor::new(&[1, 2], vec![1.0, 2.0]).tracked();
//!
//!   let loss = ((x.mm(&w) + &b).tanh() - 0.5).sqr().mean(0);
//!
//!   // Back-prop, optimize and reset gradients
//!   optimizer.minimize(&loss, &loss.parameters());
//! }
//! ```
//!
//! Training the autoencoder and sampling from it:
//! ```
//! use rand::{ SeedableRng, rngs::StdRng };
//! use stackvae::{ VaeParams, TeacherVae, SequenceBatch, Trainer, GenerationOptions };
//!
//! let params = VaeParams { rnn_cell_size: 16, latent_dim: 4, ..VaeParams::new(8) };
//! let mut rng = StdRng::seed_from_u64(0);
//! let batch = SequenceBatch::prepare(&[vec![4, 5, 6], vec![7, 4]], params.tokens(), 1.0, &mut rng)?;
//!
//! let model = TeacherVae::<f32>::from_params(&params)?;
//! let mut trainer = Trainer::new(model, &params)?;
//! trainer.train_step(&batch)?;
//!
//! let options = GenerationOptions { generate_len: 10, ..GenerationOptions::from_params(&params) };
//! let molecules = trainer.model().sample(2, &options, &mut rng)?;
//! println!("{}", molecules.summary());
//! # Ok::<(), stackvae::VaeError>(())
//! ```
//!
//! # Optional features
//!
//! Some features can be toggled in your `Cargo.toml`.
//!
//! - `unsafe` *(default)*: Accelerated matrix math using [matrixmultiply] crate.
//! - `threading`: Multi-threaded matrix multiplication.

mod internal;
mod shape;
mod tensor;
mod variable;

pub mod ops;
pub mod scalar;
pub mod optimize;
pub mod error;
pub mod config;
pub mod batch;
pub mod stack_rnn;
pub mod model;
pub mod loss;
pub mod generation;
pub mod checkpoint;
pub mod train;

pub use shape::Shape;
pub use tensor::Tensor;
pub use variable::{ Variable, UnaryOp, BinaryOp, layer };
pub use variable::layer::{ Module, Linear, Embedding, Gru, GruLayer };
pub use error::{ VaeError, Result };
pub use config::{ VaeParams, OptimizerKind };
pub use batch::{ SequenceBatch, SpecialTokens };
pub use stack_rnn::{ StackGru, Hidden, Stack };
pub use model::{ StackGruEncoder, StackGruDecoder, TeacherVae, VaeOutput };
pub use generation::{ GenerationOptions, GeneratedMolecules, MoleculeTable, TokenDecoder };
pub use checkpoint::Checkpoint;
pub use train::{ Trainer, StepStats };
