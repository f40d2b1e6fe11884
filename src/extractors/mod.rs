//! Extractors and their generator sessions.
//!
//! An [`Extractor`] recognizes call sites of one imported symbol and picks the
//! style-bearing arguments. Plain extractors start a [`GeneratorSession`];
//! factory extractors instead mint named derived extractors at runtime.

mod css;
mod generator;
mod raw;

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use swc_ecma_ast::ExprOrSpread;

use crate::config::{Config, DerivedConfig, ExtractorConfig, ExtractorKind, OutputFormat};

pub use css::CssGenerator;
pub use generator::{GenerateError, Generator, GeneratorOutput, GeneratorSession, OutputKey};
pub use raw::RawGenerator;

/// Stable identity of an extractor: `importPath:symbol`.
///
/// Derived extractors use `parent.name` as their symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ExtractorId {
    pub import_path: String,
    pub symbol: String,
}

impl ExtractorId {
    pub fn new(import_path: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            import_path: import_path.into(),
            symbol: symbol.into(),
        }
    }

    pub fn derived(&self, name: &str) -> Self {
        Self::new(self.import_path.clone(), format!("{}.{}", self.symbol, name))
    }
}

impl fmt::Display for ExtractorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.import_path, self.symbol)
    }
}

/// Which call arguments carry style data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallShape {
    /// `css(style, ...)`
    AllArgs,
    /// `styled(target, style, ...)`
    SkipTarget,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainExtractor {
    pub id: ExtractorId,
    pub shape: CallShape,
    pub output: OutputFormat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactoryExtractor {
    pub id: ExtractorId,
    pub derived: BTreeMap<String, Extractor>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extractor {
    Plain(PlainExtractor),
    Factory(FactoryExtractor),
}

impl Extractor {
    pub fn id(&self) -> &ExtractorId {
        match self {
            Extractor::Plain(plain) => &plain.id,
            Extractor::Factory(factory) => &factory.id,
        }
    }

    pub fn is_factory(&self) -> bool {
        matches!(self, Extractor::Factory(_))
    }

    /// The style-bearing subset of a call's arguments. Factory calls carry
    /// configuration, not style data.
    pub fn style_args<'e>(&self, args: &'e [ExprOrSpread]) -> &'e [ExprOrSpread] {
        match self {
            Extractor::Plain(plain) => match plain.shape {
                CallShape::AllArgs => args,
                CallShape::SkipTarget => args.get(1..).unwrap_or(&[]),
            },
            Extractor::Factory(_) => &[],
        }
    }

    /// A fresh accumulation session, or `None` for factories.
    pub fn start_session(&self, class_prefix: &str) -> Option<GeneratorSession> {
        let Extractor::Plain(plain) = self else {
            return None;
        };
        Some(match plain.output {
            OutputFormat::Css => {
                let slug = plain.id.symbol.replace('.', "-");
                CssGenerator::new(format!("{class_prefix}{slug}-")).into()
            }
            OutputFormat::Raw => RawGenerator::default().into(),
        })
    }

    pub fn derived(&self, name: &str) -> Option<&Extractor> {
        match self {
            Extractor::Factory(factory) => factory.derived.get(name),
            Extractor::Plain(_) => None,
        }
    }

    /// This extractor and every extractor it can derive, depth-first.
    pub fn flatten(&self) -> Vec<&Extractor> {
        let mut out = vec![self];
        if let Extractor::Factory(factory) = self {
            for derived in factory.derived.values() {
                out.extend(derived.flatten());
            }
        }
        out
    }

    fn from_kind(id: ExtractorId, kind: ExtractorKind, output: Option<OutputFormat>, derived: &[DerivedConfig]) -> Self {
        match kind {
            ExtractorKind::Factory => Extractor::Factory(FactoryExtractor {
                derived: derived
                    .iter()
                    .map(|d| {
                        (
                            d.symbol.clone(),
                            Extractor::from_kind(id.derived(&d.symbol), d.kind, d.output, &d.derived),
                        )
                    })
                    .collect(),
                id,
            }),
            ExtractorKind::Css | ExtractorKind::Styled => Extractor::Plain(PlainExtractor {
                id,
                shape: if kind == ExtractorKind::Styled {
                    CallShape::SkipTarget
                } else {
                    CallShape::AllArgs
                },
                output: output.unwrap_or(OutputFormat::Css),
            }),
        }
    }
}

impl From<&ExtractorConfig> for Extractor {
    fn from(config: &ExtractorConfig) -> Self {
        Extractor::from_kind(
            ExtractorId::new(&config.import_path, &config.symbol),
            config.kind,
            config.output,
            &config.derived,
        )
    }
}

/// The set of extractors recognized in a build.
#[derive(Debug, Clone, Default)]
pub struct ExtractorRegistry {
    extractors: Vec<Extractor>,
}

impl ExtractorRegistry {
    pub fn new(extractors: Vec<Extractor>) -> Self {
        Self { extractors }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.extractors.iter().map(Extractor::from).collect())
    }

    /// Whether an import specifier names a style library (which is never
    /// bundled or followed).
    pub fn is_library(&self, source: &str) -> bool {
        self.extractors
            .iter()
            .any(|extractor| extractor.id().import_path == source)
    }

    /// Extractor exported as `symbol` from `source`.
    pub fn lookup(&self, source: &str, symbol: &str) -> Option<&Extractor> {
        self.extractors
            .iter()
            .find(|e| e.id().import_path == source && e.id().symbol == symbol)
    }

    /// Any extractor, including derived ones, by id.
    pub fn find(&self, id: &ExtractorId) -> Option<&Extractor> {
        self.all().into_iter().find(|extractor| extractor.id() == id)
    }

    /// Every top-level extractor.
    pub fn top_level(&self) -> &[Extractor] {
        &self.extractors
    }

    /// Every extractor, including derived ones.
    pub fn all(&self) -> Vec<&Extractor> {
        self.extractors.iter().flat_map(Extractor::flatten).collect()
    }
}
