//! Sample corpus generator for trying the map without real data.

use anyhow::{Context, Result};
use clap::ValueEnum;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use std::path::{Path, PathBuf};

const WORDS: &[&str] = &[
    "and", "the", "quick", "slow", "steady", "brown", "grey", "white", "grebe", "heron", "ibis",
    "jumps", "walks", "flies", "slowly", "quickly", "steadily", "over", "under", "between",
    "lazy", "calm", "collected", "dog", "frog", "bird",
];

const CSS_PROPERTIES: &[&str] = &[
    "background-color",
    "color",
    "font-size",
    "margin",
    "padding",
    "border",
    "width",
    "height",
    "display",
    "flex",
    "justify-content",
    "align-items",
    "border-radius",
    "box-shadow",
    "opacity",
    "transition",
    "transform",
    "position",
    "top",
    "left",
    "right",
    "bottom",
];

const CSS_SELECTORS: &[&str] = &["body", "h1", "p", ".class", "#id", "div", "span"];

const JSON_KEYS: &[&str] = &[
    "name",
    "version",
    "description",
    "keywords",
    "author",
    "license",
    "dependencies",
    "scripts",
    "repository",
    "homepage",
    "bugs",
    "engines",
    "main",
    "types",
    "files",
];

const MARKDOWN_HEADERS: &[&str] = &["# ", "## ", "### ", "#### ", "##### ", "###### "];

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SampleType {
    Txt,
    Md,
    Json,
    Css,
    Py,
    Html,
    Js,
}

impl SampleType {
    pub const ALL: [Self; 7] = [
        Self::Txt,
        Self::Md,
        Self::Json,
        Self::Css,
        Self::Py,
        Self::Html,
        Self::Js,
    ];

    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Txt => "txt",
            Self::Md => "md",
            Self::Json => "json",
            Self::Css => "css",
            Self::Py => "py",
            Self::Html => "html",
            Self::Js => "js",
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub out: PathBuf,
    /// Files per type; names run `sample_1` through `sample_<count>`.
    pub count: usize,
    pub types: Vec<SampleType>,
    pub seed: Option<u64>,
}

/// Writes the sample files and returns their paths in creation order.
pub fn create_sample_files(config: &GeneratorConfig) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(&config.out)
        .with_context(|| format!("create {}", config.out.display()))?;
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let mut created = Vec::with_capacity(config.count * config.types.len());
    for i in 1..=config.count {
        for &kind in &config.types {
            let path = config.out.join(format!("sample_{i}.{}", kind.extension()));
            write_sample(&path, &sample_content(kind, &mut rng)?)?;
            created.push(path);
        }
    }
    Ok(created)
}

fn write_sample(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).with_context(|| format!("write {}", path.display()))
}

fn sample_content(kind: SampleType, rng: &mut impl Rng) -> Result<String> {
    let content = match kind {
        SampleType::Txt => words(rng, 5, 30),
        SampleType::Md => markdown(rng),
        SampleType::Json => json(rng)?,
        SampleType::Css => css(rng),
        SampleType::Py => format!("print('{}')", words(rng, 3, 7)),
        SampleType::Html => format!(
            "<html><body><h1>{}</h1><p>{}</p></body></html>",
            capitalize(&words(rng, 2, 5)),
            words(rng, 10, 20)
        ),
        SampleType::Js => format!("console.log('{}');", words(rng, 3, 7)),
    };
    Ok(content)
}

fn pick<'a>(rng: &mut impl Rng, items: &[&'a str]) -> &'a str {
    items.choose(rng).copied().unwrap_or_default()
}

fn words(rng: &mut impl Rng, min: usize, max: usize) -> String {
    let count = rng.random_range(min..=max);
    (0..count)
        .map(|_| pick(rng, WORDS))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Uppercases the first character and lowercases the rest.
fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn markdown(rng: &mut impl Rng) -> String {
    let sections = rng.random_range(1..=4);
    let mut parts = Vec::with_capacity(sections * 2);
    for _ in 0..sections {
        let header = pick(rng, MARKDOWN_HEADERS);
        parts.push(format!("{header}{}\n", capitalize(&words(rng, 3, 7))));
        parts.push(format!("{}\n", words(rng, 20, 50)));
    }
    parts.join("\n")
}

fn css(rng: &mut impl Rng) -> String {
    let rules = rng.random_range(1..=5);
    (0..rules)
        .map(|_| {
            let selector = pick(rng, CSS_SELECTORS);
            let props = rng.random_range(2..=5);
            let body = (0..props)
                .map(|_| {
                    let prop = pick(rng, CSS_PROPERTIES);
                    format!("{prop}: {};", words(rng, 1, 3).replace(' ', "-"))
                })
                .collect::<Vec<_>>()
                .join(" ");
            format!("{selector} {{ {body} }}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn json(rng: &mut impl Rng) -> Result<String> {
    let keys = rng.random_range(3..=7);
    let mut data = serde_json::Map::new();
    for _ in 0..keys {
        let key = pick(rng, JSON_KEYS);
        let value = match key {
            "version" => {
                let version: f64 = rng.random_range(0.1..5.0);
                serde_json::json!((version * 100.0).round() / 100.0)
            }
            "dependencies" | "scripts" => {
                let packages = rng.random_range(2..=5);
                let map: serde_json::Map<String, serde_json::Value> = (0..packages)
                    .map(|i| {
                        let range = format!(
                            "^{}.{}.{}",
                            rng.random_range(1..=10),
                            rng.random_range(0..=20),
                            rng.random_range(0..=20)
                        );
                        (format!("package_{i}"), serde_json::Value::String(range))
                    })
                    .collect();
                serde_json::Value::Object(map)
            }
            _ => serde_json::Value::String(words(rng, 3, 10)),
        };
        data.insert(key.to_string(), value);
    }
    Ok(serde_json::to_string_pretty(&serde_json::Value::Object(data))?)
}
