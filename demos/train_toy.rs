use rand::{ SeedableRng, rngs::StdRng, seq::SliceRandom };
use tracing_subscriber::EnvFilter;

use stackvae::{
  VaeParams, OptimizerKind, TeacherVae, SequenceBatch, Trainer, GenerationOptions, Module,
};

// Tiny SMILES vocabulary, including the special tokens
const VOCAB: [&str; 12] = ["<pad>", "<unk>", "<start>", "<end>", "C", "O", "N", "(", ")", "=", "1", "c"];

fn tokenize(smiles: &str) -> Vec<usize> {
  smiles.chars()
    .map(|c| VOCAB.iter().position(|&t| t.len() == 1 && t.starts_with(c) ).unwrap_or(1) )
    .collect()
}

fn main() -> stackvae::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env().add_directive("stackvae=info".parse().unwrap()))
    .init();

  let params = VaeParams {
    embedding_size: 8,
    rnn_cell_size: 32,
    latent_dim: 8,
    stack_width: 4,
    stack_depth: 8,
    batch_size: 4,
    learning_rate: 0.005,
    optimizer: OptimizerKind::Adam,
    clip_grad: Some(5.0),
    input_keep: 0.9,
    generate_len: 30,
    kl_growth: 0.01,
    ..VaeParams::new(VOCAB.len())
  };
  params.validate()?;

  let mut corpus: Vec<Vec<usize>> = [
    "CCO", "CC(C)O", "CCN", "C=O", "CC(=O)O", "c1ccccc1", "CCOC", "NCCO",
    "CC(N)C", "OCC(O)CO", "C1CC1", "CC=C",
  ].iter().map(|s| tokenize(s) ).collect();

  let mut rng = StdRng::seed_from_u64(42);
  let model = TeacherVae::<f32>::from_params(&params)?;
  let mut trainer = Trainer::new(model, &params)?;

  for epoch in 0..30 {
    corpus.shuffle(&mut rng);
    let batches = corpus.chunks(params.batch_size)
      .map(|chunk| SequenceBatch::prepare(chunk, params.tokens(), params.input_keep, &mut rng) )
      .collect::<stackvae::Result<Vec<_>>>()?;
    let stats = trainer.train_epoch(&batches)?;
    if epoch % 10 == 9 {
      let eval = trainer.evaluate(&batches)?;
      println!("epoch {:>3}  train {:.3}  eval {:.3}  kl {:.3}", epoch + 1, stats.loss, eval.loss, eval.kl_divergence);
    }
  }

  let mut model = trainer.into_model();
  model.set_training(false);
  let options = GenerationOptions::from_params(&params);
  let molecules = model.sample(8, &options, &mut rng)?;
  let table = molecules.summary_with(&|tokens: &[usize]| {
    tokens.iter().map(|&t| VOCAB[t] ).collect::<String>()
  });
  println!("{table}");

  let path = std::env::temp_dir().join("stackvae_toy.ckpt");
  model.save_model(&path)?;
  let restored = TeacherVae::<f32>::from_checkpoint(&path)?;
  println!("Restored {} parameters from {}", restored.num_parameters(), path.display());

  Ok(())
}
