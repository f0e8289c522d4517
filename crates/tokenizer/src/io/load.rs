//! Load functionality for trained tokenizers.
//!
//! Every loader validates what it reads: ids must be dense and unique, the
//! configured special tokens must hold the first ids in order, and every
//! merge must name tokens that exist and whose concatenation exists.

use super::format::{SerializedTokenizer, VocabEntries, BUNDLE_FILE, MERGES_HEADER};
use crate::tokenizer::TokenizerConfig;
use ahash::AHashSet;
use bpeprep_core::{
    char_to_byte, MergeRules, Result, TokenKind, TokenizerError, Vocabulary,
};
use log::debug;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// A model read back from disk.
#[derive(Debug)]
pub struct LoadedModel {
    pub vocab: Vocabulary,
    pub merges: MergeRules,
}

/// Tokenizer loader - reads trained models.
pub struct TokenizerLoader;

impl TokenizerLoader {
    /// Load `tokenizer.json` from `dir`.
    pub fn load_bundle(dir: &Path) -> Result<(TokenizerConfig, LoadedModel)> {
        let path = dir.join(BUNDLE_FILE);
        let file = File::open(&path).map_err(|e| TokenizerError::io(&path, e))?;
        let bundle: SerializedTokenizer = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| TokenizerError::corrupt(&path, e.to_string()))?;

        let vocab = build_vocabulary(&path, bundle.vocab, &bundle.config)?;
        let merges = parse_merges(&path, bundle.merges.iter().map(String::as_str), &vocab)?;
        check_merged_tokens(&path, &vocab, &merges)?;

        Ok((bundle.config, LoadedModel { vocab, merges }))
    }

    /// Load a `vocab.json` / `merges.txt` pair.
    ///
    /// The files do not record which tokens are special, so `config` must
    /// list the same special tokens the model was trained with.
    pub fn load_vocab_merges(
        vocab_path: &Path,
        merges_path: &Path,
        config: &TokenizerConfig,
    ) -> Result<LoadedModel> {
        let file = File::open(vocab_path).map_err(|e| TokenizerError::io(vocab_path, e))?;
        let entries: VocabEntries = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| TokenizerError::corrupt(vocab_path, e.to_string()))?;
        let vocab = build_vocabulary(vocab_path, entries, config)?;

        let text = std::fs::read_to_string(merges_path)
            .map_err(|e| TokenizerError::io(merges_path, e))?;
        let mut lines = text.lines().peekable();
        if lines.peek().is_some_and(|line| line.starts_with("#version")) {
            lines.next();
        }
        let merges = parse_merges(merges_path, lines, &vocab)?;
        check_merged_tokens(merges_path, &vocab, &merges)?;

        debug!(
            "loaded {} tokens and {} merges from {}",
            vocab.len(),
            merges.len(),
            vocab_path.display()
        );

        Ok(LoadedModel { vocab, merges })
    }
}

/// Rebuild a vocabulary with exactly the stored ids.
fn build_vocabulary(
    path: &Path,
    entries: VocabEntries,
    config: &TokenizerConfig,
) -> Result<Vocabulary> {
    let mut entries = entries.0;
    entries.sort_by_key(|&(_, id)| id);

    let mut seen = AHashSet::with_capacity(entries.len());
    for (expected, (token, id)) in entries.iter().enumerate() {
        if *id as usize != expected {
            return Err(TokenizerError::corrupt(
                path,
                format!("ids are not dense: expected {expected}, found {id} for {token:?}"),
            ));
        }
        if !seen.insert(token.as_str()) {
            return Err(TokenizerError::corrupt(
                path,
                format!("duplicate token {token:?}"),
            ));
        }
    }

    let specials = &config.special_tokens;
    let stored: Vec<&str> = entries
        .iter()
        .take(specials.len())
        .map(|(token, _)| token.as_str())
        .collect();
    if stored != specials.iter().map(String::as_str).collect::<Vec<_>>() {
        return Err(TokenizerError::corrupt(
            path,
            format!("special tokens {specials:?} do not hold the first ids"),
        ));
    }

    let mut vocab = Vocabulary::with_capacity(entries.len());
    vocab.add_special_tokens(specials.as_slice())?;
    for (token, id) in entries.iter().skip(specials.len()) {
        let kind = token_kind(path, token)?;
        let assigned = vocab.add_token(token, kind)?;
        if assigned != *id {
            return Err(TokenizerError::corrupt(
                path,
                format!("token {token:?} landed on id {assigned}, expected {id}"),
            ));
        }
    }
    if let Some(unk) = &config.unknown_token {
        vocab.set_unknown_token(unk)?;
    }

    Ok(vocab)
}

/// Single byte symbols are base entries; longer byte-symbol strings are merges.
fn token_kind(path: &Path, token: &str) -> Result<TokenKind> {
    if token.chars().any(|ch| char_to_byte(ch).is_none()) {
        return Err(TokenizerError::corrupt(
            path,
            format!("token {token:?} is not a byte-level symbol string"),
        ));
    }
    if token.chars().count() == 1 {
        Ok(TokenKind::Base)
    } else {
        Ok(TokenKind::Merged)
    }
}

fn parse_merges<'l, I>(path: &Path, lines: I, vocab: &Vocabulary) -> Result<MergeRules>
where
    I: IntoIterator<Item = &'l str>,
{
    let mut merges = MergeRules::new();

    for (index, line) in lines.into_iter().enumerate() {
        if line.is_empty() || line.starts_with(MERGES_HEADER) {
            continue;
        }
        let (left, right) = match line.split_once(' ') {
            Some((l, r)) if !l.is_empty() && !r.is_empty() && !r.contains(' ') => (l, r),
            _ => {
                return Err(TokenizerError::corrupt(
                    path,
                    format!("merge {}: expected `left right`, got {line:?}", index + 1),
                ))
            }
        };

        let id_of = |token: &str| {
            vocab
                .get_id(token)
                .filter(|&id| vocab.kind(id).is_some_and(TokenKind::is_mergeable))
                .ok_or_else(|| {
                    TokenizerError::corrupt(
                        path,
                        format!("merge {}: {token:?} is not in the vocabulary", index + 1),
                    )
                })
        };
        let left_id = id_of(left)?;
        let right_id = id_of(right)?;
        let new_id = id_of(&format!("{left}{right}"))?;

        merges.push((left_id, right_id), new_id).map_err(|_| {
            TokenizerError::corrupt(path, format!("merge {}: duplicate rule {line:?}", index + 1))
        })?;
    }

    Ok(merges)
}

/// Every merged entry must be the output of some rule.
fn check_merged_tokens(path: &Path, vocab: &Vocabulary, merges: &MergeRules) -> Result<()> {
    let produced: AHashSet<u32> = merges.iter().map(|rule| rule.new_id).collect();
    for (id, entry) in vocab.iter() {
        if entry.kind == TokenKind::Merged && !produced.contains(&id) {
            return Err(TokenizerError::corrupt(
                path,
                format!("token {:?} is not produced by any merge", entry.token),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::save::TokenizerSaver;

    fn config(specials: &[&str]) -> TokenizerConfig {
        TokenizerConfig {
            special_tokens: specials.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn write(dir: &Path, vocab: &str, merges: &str) -> (std::path::PathBuf, std::path::PathBuf) {
        let vocab_path = dir.join("vocab.json");
        let merges_path = dir.join("merges.txt");
        std::fs::write(&vocab_path, vocab).unwrap();
        std::fs::write(&merges_path, merges).unwrap();
        (vocab_path, merges_path)
    }

    #[test]
    fn test_load_restores_exact_ids() {
        let dir = tempfile::tempdir().unwrap();
        let (v, m) = write(
            dir.path(),
            r#"{"b":2,"<s>":0,"a":1,"ab":3}"#,
            "#version: 0.2\na b\n",
        );

        let model = TokenizerLoader::load_vocab_merges(&v, &m, &config(&["<s>"])).unwrap();
        assert_eq!(model.vocab.get_id("ab"), Some(3));
        assert_eq!(model.vocab.kind(1), Some(TokenKind::Base));
        assert_eq!(model.vocab.kind(3), Some(TokenKind::Merged));
        assert_eq!(model.merges.get((1, 2)), Some((0, 3)));
    }

    #[test]
    fn test_corrupt_vocab_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cases = [
            r#"{"<s>":0,"a":2}"#,
            r#"{"<s>":0,"a":1,"a":2}"#,
            r#"{"<s>":0,"a":1,"b":1}"#,
            r#"{"a":0,"<s>":1}"#,
            r#"{"<s>":0,"a b":1}"#,
            r#"not json"#,
        ];
        for vocab in cases {
            let (v, m) = write(dir.path(), vocab, "#version: 0.2\n");
            let err = TokenizerLoader::load_vocab_merges(&v, &m, &config(&["<s>"])).unwrap_err();
            assert!(
                matches!(err, TokenizerError::CorruptArtifact { .. }),
                "{vocab}: {err}"
            );
        }
    }

    #[test]
    fn test_corrupt_merges_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let vocab = r#"{"<s>":0,"a":1,"b":2,"ab":3}"#;
        let cases = [
            "#version: 0.2\nab\n",
            "#version: 0.2\na c\n",
            "#version: 0.2\nb a\n",
            "#version: 0.2\n<s> a\n",
            "#version: 0.2\na b\na b\n",
            "#version: 0.2\n",
        ];
        for merges in cases {
            let (v, m) = write(dir.path(), vocab, merges);
            let err = TokenizerLoader::load_vocab_merges(&v, &m, &config(&["<s>"])).unwrap_err();
            assert!(
                matches!(err, TokenizerError::CorruptArtifact { .. }),
                "{merges:?}: {err}"
            );
        }
    }

    #[test]
    fn test_bundle_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut vocab = Vocabulary::new();
        vocab.add_special_tokens(&["<pad>", "<unk>"]).unwrap();
        let x = vocab.add_token("x", TokenKind::Base).unwrap();
        let xx = vocab.add_token("xx", TokenKind::Merged).unwrap();
        let mut merges = MergeRules::new();
        merges.push((x, x), xx).unwrap();

        let mut cfg = config(&["<pad>", "<unk>"]);
        cfg.unknown_token = Some("<unk>".to_string());
        cfg.max_length = Some(8);
        TokenizerSaver::new(&vocab, &merges)
            .save_bundle(dir.path(), &cfg)
            .unwrap();

        let (loaded_cfg, model) = TokenizerLoader::load_bundle(dir.path()).unwrap();
        assert_eq!(loaded_cfg, cfg);
        assert_eq!(model.vocab.len(), 4);
        assert_eq!(model.vocab.special().unk(), Some(1));
        assert_eq!(model.merges.as_slice(), merges.as_slice());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = TokenizerLoader::load_bundle(dir.path()).unwrap_err();
        assert!(matches!(err, TokenizerError::Io { .. }));
    }
}
