use bpeprep_tokenizer::pipeline::{self, read_tokens, PipelineConfig, CLEAN_CORPUS_FILE};
use bpeprep_tokenizer::{Tokenizer, TokenizerConfig, TokenizerError};
use std::path::Path;

const CORPUS: &str = "\
<p>Қазақстан Республикасы Орталық Азияда орналасқан мемлекет.</p>
Қазақстан астанасы Астана қаласы. [1]

Алматы Қазақстанның ең үлкен қаласы, 2024 жылы халқы көп.
Қазақ тілі Қазақстан Республикасының мемлекеттік тілі!
";

fn write_corpus(dir: &Path) -> PipelineConfig {
    let corpus = dir.join("corpus.txt");
    std::fs::write(&corpus, CORPUS).unwrap();

    let mut config = PipelineConfig {
        corpus,
        output_dir: dir.join("out"),
        ..Default::default()
    };
    config.tokenizer.vocab_size = 150;
    config
}

#[test]
fn pipeline_writes_all_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_corpus(dir.path());

    let report = pipeline::run(&config).unwrap();
    assert_eq!(report.lines, 4);
    assert_eq!(report.skipped_lines, 0);
    assert!(report.vocab_size <= 150);

    let out = dir.path().join("out");
    assert_eq!(report.vocab_path, out.join("kazakh_bpe_150-vocab.json"));
    assert_eq!(report.merges_path, out.join("kazakh_bpe_150-merges.txt"));
    assert!(report.tokenizer_path.exists());

    let clean = std::fs::read_to_string(out.join(CLEAN_CORPUS_FILE)).unwrap();
    let lines: Vec<&str> = clean.lines().collect();
    assert_eq!(lines[1], "Қазақстан астанасы Астана қаласы.");
    assert!(!clean.contains('<'));
    assert!(!clean.contains("2024"));

    let merges = std::fs::read_to_string(&report.merges_path).unwrap();
    assert!(merges.starts_with("#version: 0.2\n"));
    assert_eq!(merges.lines().count(), report.merges + 1);

    // tokens.json is the concatenation of every line's encoding
    let ids = read_tokens(&report.tokens_path).unwrap();
    assert_eq!(ids.len(), report.tokens);
    let tokenizer = Tokenizer::load(&out).unwrap();
    let expected: Vec<u32> = lines
        .iter()
        .flat_map(|line| tokenizer.encode(line).unwrap().ids)
        .collect();
    assert_eq!(ids, expected);
    assert_eq!(tokenizer.decode(&ids, false).unwrap(), lines.concat());
}

#[test]
fn vocab_merges_pair_reloads_with_same_ids() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_corpus(dir.path());
    let report = pipeline::run(&config).unwrap();

    let bundle = Tokenizer::load(&config.output_dir).unwrap();
    let pair = Tokenizer::from_vocab_merges(
        &report.vocab_path,
        &report.merges_path,
        config.tokenizer.clone(),
    )
    .unwrap();

    assert_eq!(pair.vocab_size(), bundle.vocab_size());
    assert_eq!(
        pair.merges().unwrap().as_slice(),
        bundle.merges().unwrap().as_slice()
    );
    for text in ["Қазақстан астанасы", "мемлекеттік тілі!"] {
        assert_eq!(pair.encode(text).unwrap(), bundle.encode(text).unwrap());
    }

    // Special tokens must match the ones the files were written with
    let wrong = TokenizerConfig {
        special_tokens: vec!["<pad>".to_string()],
        ..config.tokenizer.clone()
    };
    let err = Tokenizer::from_vocab_merges(&report.vocab_path, &report.merges_path, wrong)
        .unwrap_err();
    assert!(matches!(err, TokenizerError::CorruptArtifact { .. }));
}

#[test]
fn truncation_applies_per_line() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = write_corpus(dir.path());
    config.tokenizer.max_length = Some(4);

    let report = pipeline::run(&config).unwrap();
    assert_eq!(report.tokens, report.lines * 4);
    assert_eq!(report.truncated_lines, report.lines);
}

#[test]
fn empty_corpus_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = write_corpus(dir.path());
    std::fs::write(&config.corpus, "123 456\n<br>\n").unwrap();
    config.prefix = Some("empty".to_string());

    assert!(matches!(
        pipeline::run(&config),
        Err(TokenizerError::EmptyCorpus)
    ));
}
