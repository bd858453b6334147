//! Analysis configuration.
//!
//! A [`Configuration`] carries the hardcoded results that override analysis,
//! the exception policy and the collection-idiom registry. It is normally
//! assembled once at startup from presets and an optional YAML file:
//!
//! ```yaml
//! exception_policy: carry_on
//! presets: [jdk, guava]
//! hardcoded:
//!   - class: com.acme.Money
//!     result: immutable
//!   - class: com.acme.Cache
//!     result: not_immutable
//!     reason: mutable_type_to_field
//!     message: "Backed by a concurrent map"
//! collection_idioms:
//!   - field_type: java.util.List
//!     copy_methods: [com.acme.Lists.copy]
//!     wrap_methods: [com.acme.Lists.freeze]
//!     copy_and_wrap_methods: [com.acme.Lists.frozenCopy]
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use phf::phf_set;
use serde::{Deserialize, Serialize};

use crate::analysis::ClassName;
use crate::detect::{
    AnalysisResult, CodeLocation, CollectionIdiom, IsImmutable, MethodPattern, MutabilityReason,
    MutableReasonDetail, DEFAULT_IDIOMS,
};

/// File names looked for by [`discover`].
pub const CONFIG_FILE_NAMES: &[&str] = &["mutcheck.yaml", ".mutcheck.yaml"];

/// What to do when a checker fails unexpectedly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionPolicy {
    /// Abort the whole request.
    FailFast,
    /// Record an analysis error and keep going.
    #[default]
    CarryOn,
}

/// Named sets of well-known classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Preset {
    Jdk,
    Guava,
}

static JDK_IMMUTABLE: phf::Set<&'static str> = phf_set! {
    "java.lang.Object",
    "java.lang.String",
    "java.lang.Boolean",
    "java.lang.Byte",
    "java.lang.Character",
    "java.lang.Short",
    "java.lang.Integer",
    "java.lang.Long",
    "java.lang.Float",
    "java.lang.Double",
    "java.lang.Void",
    "java.lang.Class",
    "java.lang.StackTraceElement",
    "java.math.BigDecimal",
    "java.math.BigInteger",
    "java.io.File",
    "java.net.URI",
    "java.util.UUID",
    "java.util.Locale",
    "java.util.Optional",
    "java.util.OptionalInt",
    "java.util.OptionalLong",
    "java.util.OptionalDouble",
    "java.util.regex.Pattern",
    "java.time.Instant",
    "java.time.Duration",
    "java.time.Period",
    "java.time.LocalDate",
    "java.time.LocalTime",
    "java.time.LocalDateTime",
    "java.time.ZonedDateTime",
    "java.time.OffsetDateTime",
    "java.time.OffsetTime",
    "java.time.Year",
    "java.time.YearMonth",
    "java.time.MonthDay",
    "java.time.ZoneOffset",
    "java.time.DayOfWeek",
    "java.time.Month",
};

static JDK_MUTABLE: phf::Set<&'static str> = phf_set! {
    "java.lang.StringBuilder",
    "java.lang.StringBuffer",
    "java.lang.Thread",
    "java.util.ArrayList",
    "java.util.LinkedList",
    "java.util.Vector",
    "java.util.Stack",
    "java.util.ArrayDeque",
    "java.util.PriorityQueue",
    "java.util.HashMap",
    "java.util.LinkedHashMap",
    "java.util.TreeMap",
    "java.util.Hashtable",
    "java.util.Properties",
    "java.util.HashSet",
    "java.util.LinkedHashSet",
    "java.util.TreeSet",
    "java.util.BitSet",
    "java.util.Date",
    "java.util.Calendar",
    "java.util.GregorianCalendar",
    "java.util.concurrent.ConcurrentHashMap",
    "java.util.concurrent.CopyOnWriteArrayList",
    "java.util.concurrent.atomic.AtomicBoolean",
    "java.util.concurrent.atomic.AtomicInteger",
    "java.util.concurrent.atomic.AtomicLong",
    "java.util.concurrent.atomic.AtomicReference",
    "java.sql.Date",
    "java.sql.Timestamp",
};

static GUAVA_IMMUTABLE: phf::Set<&'static str> = phf_set! {
    "com.google.common.collect.ImmutableCollection",
    "com.google.common.collect.ImmutableList",
    "com.google.common.collect.ImmutableSet",
    "com.google.common.collect.ImmutableSortedSet",
    "com.google.common.collect.ImmutableMap",
    "com.google.common.collect.ImmutableSortedMap",
    "com.google.common.collect.ImmutableBiMap",
    "com.google.common.collect.ImmutableMultiset",
    "com.google.common.collect.ImmutableMultimap",
    "com.google.common.collect.ImmutableListMultimap",
    "com.google.common.collect.ImmutableSetMultimap",
    "com.google.common.collect.ImmutableTable",
    "com.google.common.collect.ImmutableRangeSet",
    "com.google.common.collect.Range",
    "com.google.common.base.Optional",
    "com.google.common.hash.HashCode",
    "com.google.common.net.HostAndPort",
    "com.google.common.net.MediaType",
    "com.google.common.primitives.ImmutableIntArray",
    "com.google.common.primitives.ImmutableLongArray",
    "com.google.common.primitives.ImmutableDoubleArray",
};

static NO_CLASSES: phf::Set<&'static str> = phf_set! {};

impl Preset {
    pub const ALL: [Preset; 2] = [Preset::Jdk, Preset::Guava];

    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::Jdk => "jdk",
            Preset::Guava => "guava",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "jdk" | "java" => Some(Preset::Jdk),
            "guava" => Some(Preset::Guava),
            _ => None,
        }
    }

    /// Classes this preset declares immutable.
    pub fn immutable_classes(&self) -> &'static phf::Set<&'static str> {
        match self {
            Preset::Jdk => &JDK_IMMUTABLE,
            Preset::Guava => &GUAVA_IMMUTABLE,
        }
    }

    /// Classes this preset declares mutable.
    pub fn mutable_classes(&self) -> &'static phf::Set<&'static str> {
        match self {
            Preset::Jdk => &JDK_MUTABLE,
            Preset::Guava => &NO_CLASSES,
        }
    }
}

impl std::fmt::Display for Preset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown preset: {}", s))
    }
}

/// Everything that steers one analysis session.
#[derive(Debug, Clone)]
pub struct Configuration {
    hardcoded: HashMap<ClassName, AnalysisResult>,
    exception_policy: ExceptionPolicy,
    collection_idioms: Vec<CollectionIdiom>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            hardcoded: HashMap::new(),
            exception_policy: ExceptionPolicy::default(),
            collection_idioms: DEFAULT_IDIOMS.clone(),
        }
    }
}

impl Configuration {
    pub fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder::new()
    }

    /// Defaults plus the JDK preset.
    pub fn out_of_the_box() -> Self {
        Self::builder().merge_preset(Preset::Jdk).build()
    }

    /// Load a YAML configuration file on top of the defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let file = ConfigFile::parse_file(path)?;
        Ok(file.apply(Self::builder())?.build())
    }

    pub fn hardcoded_result(&self, class: &ClassName) -> Option<&AnalysisResult> {
        self.hardcoded.get(class)
    }

    pub fn hardcoded_results(&self) -> &HashMap<ClassName, AnalysisResult> {
        &self.hardcoded
    }

    pub fn exception_policy(&self) -> ExceptionPolicy {
        self.exception_policy
    }

    pub fn collection_idioms(&self) -> &[CollectionIdiom] {
        &self.collection_idioms
    }

    /// The idiom registered for a field type.
    pub fn idiom_for(&self, field_type: &ClassName) -> Option<&CollectionIdiom> {
        self.collection_idioms.iter().find(|i| &i.field_type == field_type)
    }
}

/// Incremental construction of a [`Configuration`].
#[derive(Debug, Clone, Default)]
pub struct ConfigurationBuilder {
    config: Configuration,
}

impl ConfigurationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add every class a preset knows about. Entries already present win.
    pub fn merge_preset(mut self, preset: Preset) -> Self {
        for class in preset.immutable_classes().iter() {
            let name = ClassName::new(class);
            self.config
                .hardcoded
                .entry(name.clone())
                .or_insert_with(|| AnalysisResult::immutable(name));
        }
        for class in preset.mutable_classes().iter() {
            let name = ClassName::new(class);
            let message = format!("{} is a known mutable type ({} preset)", name, preset);
            self.config.hardcoded.entry(name.clone()).or_insert_with(|| {
                AnalysisResult::hardcoded(name, IsImmutable::NotImmutable, Some(&message))
            });
        }
        self
    }

    pub fn hardcode_as_immutable(self, class: impl Into<ClassName>) -> Self {
        self.hardcode(AnalysisResult::immutable(class))
    }

    pub fn hardcode_as_not_immutable(self, class: impl Into<ClassName>, message: &str) -> Self {
        self.hardcode(AnalysisResult::hardcoded(class, IsImmutable::NotImmutable, Some(message)))
    }

    /// Hardcode a result, replacing any previous entry for the class.
    pub fn hardcode(mut self, result: AnalysisResult) -> Self {
        self.config.hardcoded.insert(result.class_name.clone(), result);
        self
    }

    /// Register an idiom, replacing any existing one for the same field type.
    pub fn add_collection_idiom(mut self, idiom: CollectionIdiom) -> Self {
        self.config
            .collection_idioms
            .retain(|i| i.field_type != idiom.field_type);
        self.config.collection_idioms.push(idiom);
        self
    }

    pub fn clear_collection_idioms(mut self) -> Self {
        self.config.collection_idioms.clear();
        self
    }

    pub fn exception_policy(mut self, policy: ExceptionPolicy) -> Self {
        self.config.exception_policy = policy;
        self
    }

    pub fn fail_fast(self) -> Self {
        self.exception_policy(ExceptionPolicy::FailFast)
    }

    pub fn build(self) -> Configuration {
        self.config
    }
}

/// On-disk configuration format.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub exception_policy: Option<ExceptionPolicy>,
    #[serde(default)]
    pub presets: Vec<String>,
    #[serde(default)]
    pub hardcoded: Vec<HardcodedEntry>,
    #[serde(default)]
    pub collection_idioms: Vec<IdiomEntry>,
    /// Drop the built-in `java.util` idioms before adding these.
    #[serde(default)]
    pub replace_default_idioms: bool,
}

/// A configured verdict for one class.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HardcodedEntry {
    pub class: String,
    /// `immutable`, `effectively_immutable`, `not_immutable` or `could_not_analyse`.
    pub result: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl HardcodedEntry {
    fn to_result(&self) -> anyhow::Result<AnalysisResult> {
        let verdict: IsImmutable = self
            .result
            .parse()
            .map_err(|e: String| anyhow::anyhow!("{} (class {})", e, self.class))?;
        let class = ClassName::new(&self.class);
        if verdict == IsImmutable::Immutable {
            if self.reason.is_some() {
                bail!("class {} is hardcoded immutable but lists a reason", self.class);
            }
            return Ok(AnalysisResult::immutable(class));
        }
        let reason = match &self.reason {
            Some(r) => r
                .parse::<MutabilityReason>()
                .map_err(|e| anyhow::anyhow!("{} (class {})", e, self.class))?,
            None => MutabilityReason::Hardcoded,
        };
        let message = self
            .message
            .clone()
            .unwrap_or_else(|| "Result hardcoded in configuration.".to_string());
        let detail = MutableReasonDetail::new(reason, CodeLocation::class(&class), message);
        Ok(AnalysisResult::new(class, verdict, vec![detail]))
    }
}

/// A configured collection idiom. Methods are written `owner.name`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IdiomEntry {
    pub field_type: String,
    #[serde(default)]
    pub copy_methods: Vec<String>,
    #[serde(default)]
    pub wrap_methods: Vec<String>,
    #[serde(default)]
    pub copy_and_wrap_methods: Vec<String>,
}

impl IdiomEntry {
    fn to_idiom(&self) -> anyhow::Result<CollectionIdiom> {
        let parse = |s: &String| {
            MethodPattern::parse(s).with_context(|| format!("invalid method {:?}, expected owner.name", s))
        };
        let mut idiom = CollectionIdiom::new(self.field_type.as_str());
        idiom.copy_methods = self.copy_methods.iter().map(parse).collect::<anyhow::Result<_>>()?;
        idiom.wrap_methods = self.wrap_methods.iter().map(parse).collect::<anyhow::Result<_>>()?;
        idiom.copy_and_wrap_methods = self
            .copy_and_wrap_methods
            .iter()
            .map(parse)
            .collect::<anyhow::Result<_>>()?;
        Ok(idiom)
    }
}

impl ConfigFile {
    /// Parse a configuration from a YAML file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content =
            fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
        let file: ConfigFile =
            serde_yaml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))?;
        validate(&file)?;
        Ok(file)
    }

    /// Layer this file onto `builder`. Explicit entries go in before the
    /// presets, which never overwrite an existing entry.
    pub fn apply(&self, mut builder: ConfigurationBuilder) -> anyhow::Result<ConfigurationBuilder> {
        if let Some(policy) = self.exception_policy {
            builder = builder.exception_policy(policy);
        }
        for entry in &self.hardcoded {
            builder = builder.hardcode(entry.to_result()?);
        }
        for name in &self.presets {
            let preset = name.parse::<Preset>().map_err(anyhow::Error::msg)?;
            builder = builder.merge_preset(preset);
        }
        if self.replace_default_idioms {
            builder = builder.clear_collection_idioms();
        }
        for entry in &self.collection_idioms {
            builder = builder.add_collection_idiom(entry.to_idiom()?);
        }
        Ok(builder)
    }
}

/// Validate a configuration file for correctness.
pub fn validate(file: &ConfigFile) -> anyhow::Result<()> {
    for name in &file.presets {
        if Preset::parse(name).is_none() {
            bail!(
                "unknown preset {:?}, expected one of: {}",
                name,
                Preset::ALL.map(|p| p.as_str()).join(", ")
            );
        }
    }

    let mut seen = HashMap::new();
    for entry in &file.hardcoded {
        if entry.class.trim().is_empty() {
            bail!("hardcoded entry with empty class name");
        }
        entry.to_result()?;
        if seen.insert(ClassName::new(&entry.class), ()).is_some() {
            bail!("class {} is hardcoded more than once", entry.class);
        }
    }

    for entry in &file.collection_idioms {
        if entry.wrap_methods.is_empty() && entry.copy_and_wrap_methods.is_empty() {
            bail!(
                "collection idiom for {} has neither wrap_methods nor copy_and_wrap_methods",
                entry.field_type
            );
        }
        entry.to_idiom()?;
    }

    Ok(())
}

/// Find a configuration file in `dir`.
pub fn discover<P: AsRef<Path>>(dir: P) -> Option<PathBuf> {
    CONFIG_FILE_NAMES
        .iter()
        .map(|name| dir.as_ref().join(name))
        .find(|path| path.is_file())
}
