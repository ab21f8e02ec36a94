use rs_ngram_core::model::{Artifact, GenerationRequest, Model, Smoothing, SmoothingKind, TrainerConfig};
use rs_ngram_core::tokenizer::CharTokenizer;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // RUST_LOG=debug shows table sizes and why each generation stopped
    env_logger::init();

    // Corpus path and prompt, e.g. `rs-ngram-demo ./data/names.txt "ma"`
    let mut args = std::env::args().skip(1);
    let corpus_path = args.next().unwrap_or_else(|| "./data/corpus.txt".to_owned());
    let prompt = args.next().unwrap_or_default();

    let smoothing = Smoothing::kneser_ney(0.75)?;
    let config = TrainerConfig { order: 4, smoothing: SmoothingKind::KneserNey };

    // The artifact stores its vocabulary, so a cached `<corpus>.bin` is
    // enough to rebuild the tokenizer without reading the corpus again
    let artifact_path = Artifact::cache_path(&corpus_path)?;
    let model = match Model::load_with(&artifact_path, smoothing, CharTokenizer::from_vocabulary) {
        Ok(model) if model.artifact().metadata().order == config.order => model,
        _ => {
            // First run (or a stale cache): train on every line of the corpus
            // and write `<corpus>.bin` next to it
            let corpus = std::fs::read_to_string(&corpus_path)?;
            let tokenizer = CharTokenizer::from_corpus(&corpus);
            let artifact = Artifact::from_corpus_file(&corpus_path, &tokenizer, config)?;
            Model::new(artifact, tokenizer, smoothing)?
        }
    };
    let model = model.with_name("demo");

    let artifact = model.artifact();
    log::info!(
        "artifact: order {}, {} tokens, vocabulary {}",
        artifact.order(),
        artifact.metadata().total_tokens,
        artifact.vocab_size()
    );

    // A stop sequence of "\n" keeps each sample on one line
    let mut request = GenerationRequest::new(prompt)
        .with_max_tokens(80)
        .with_top_k(8)
        .with_stop_sequence("\n");

    // Invalid temperatures are rejected up front
    match request.set_temperature(0.0) {
        Ok(_) => println!("Should not happen"),
        Err(e) => println!("Rejected: {e}"),
    }
    request.set_temperature(0.9)?;

    // Seeded requests are reproducible: the same seed always gives the same text
    for seed in 0..5 {
        let response = model.generate(&request.clone().with_seed(seed))?;
        println!(
            "[seed {}] {} ({} tokens, {:?}, {} ms)",
            seed,
            response.generated_text,
            response.usage.output_tokens,
            response.finish_reason,
            response.latency_ms
        );
    }

    // Without a seed the output changes from run to run
    let response = model.generate(&request)?;
    println!("[unseeded] {} ({})", response.generated_text, response.model_identifier);

    Ok(())
}
