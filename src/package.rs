//! Structural model of the E-utilities SRA documents.
//!
//! Decoding only mirrors the XML shape: every element and attribute is
//! optional and unknown content is skipped. Choosing between alternative
//! sources for a value happens afterwards, in [`crate::resolve`].

use quick_xml::Reader;
use quick_xml::events::Event;
use serde::Deserialize;

use crate::domain::Identifier;
use crate::error::SraMetaError;

/// Root of an `efetch` response: `EXPERIMENT_PACKAGE_SET`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageSet {
    #[serde(rename = "EXPERIMENT_PACKAGE", default)]
    pub packages: Vec<Package>,
}

impl PackageSet {
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Package {
    #[serde(rename = "EXPERIMENT", default)]
    pub experiment: Experiment,
    #[serde(rename = "SAMPLE", default)]
    pub sample: Sample,
    #[serde(rename = "RUN_SET", default)]
    pub run_set: RunSet,
    #[serde(rename = "PLATFORM", default)]
    pub platform: Platform,
    #[serde(rename = "Organization", default)]
    pub organization: Option<Organization>,
    #[serde(rename = "ReleaseDate", default)]
    pub release_date: String,
    #[serde(rename = "LoadDate", default)]
    pub load_date: String,
}

impl Package {
    pub fn runs(&self) -> &[Run] {
        &self.run_set.runs
    }

    /// Instrument model from the package-level platform, else the one
    /// nested in the experiment (where efetch normally puts it).
    pub fn instrument_model(&self) -> Option<&str> {
        self.platform
            .instrument_model()
            .or_else(|| self.experiment.platform.instrument_model())
    }
}

/// An `EXTERNAL_ID` node: a namespace attribute plus the identifier text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExternalId {
    #[serde(rename = "@namespace", default)]
    pub namespace: String,
    #[serde(rename = "$text", default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Identifiers {
    #[serde(rename = "EXTERNAL_ID", default)]
    pub external_ids: Vec<ExternalId>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StudyRef {
    #[serde(rename = "@accession", default)]
    pub accession: String,
    #[serde(rename = "IDENTIFIERS", default)]
    pub identifiers: Identifiers,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Experiment {
    #[serde(rename = "@accession", default)]
    pub accession: String,
    #[serde(rename = "TITLE", default)]
    pub title: String,
    #[serde(rename = "DESIGN", default)]
    pub design: Design,
    #[serde(rename = "STUDY_REF", default)]
    pub study_ref: StudyRef,
    #[serde(rename = "PLATFORM", default)]
    pub platform: Platform,
}

impl Experiment {
    pub fn external_ids(&self) -> &[ExternalId] {
        &self.study_ref.identifiers.external_ids
    }

    pub fn library(&self) -> &LibraryDescriptor {
        &self.design.library_descriptor
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Design {
    #[serde(rename = "LIBRARY_DESCRIPTOR", default)]
    pub library_descriptor: LibraryDescriptor,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LibraryDescriptor {
    #[serde(rename = "LIBRARY_STRATEGY", default)]
    pub strategy: String,
    #[serde(rename = "LIBRARY_SOURCE", default)]
    pub source: String,
    #[serde(rename = "LIBRARY_SELECTION", default)]
    pub selection: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Sample {
    #[serde(rename = "@accession", default)]
    pub accession: String,
    #[serde(rename = "TITLE", default)]
    pub title: String,
    #[serde(rename = "IDENTIFIERS", default)]
    pub identifiers: Identifiers,
    #[serde(rename = "SAMPLE_ATTRIBUTES", default)]
    pub attributes: SampleAttributes,
}

impl Sample {
    pub fn external_ids(&self) -> &[ExternalId] {
        &self.identifiers.external_ids
    }

    pub fn attributes(&self) -> &[SampleAttribute] {
        &self.attributes.items
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SampleAttributes {
    #[serde(rename = "SAMPLE_ATTRIBUTE", default)]
    pub items: Vec<SampleAttribute>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SampleAttribute {
    #[serde(rename = "TAG", default)]
    pub tag: String,
    #[serde(rename = "VALUE", default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunSet {
    #[serde(rename = "RUN", default)]
    pub runs: Vec<Run>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Run {
    #[serde(rename = "@accession", default)]
    pub accession: String,
    #[serde(rename = "@total_spots", default)]
    pub total_spots: String,
    #[serde(rename = "@total_bases", default)]
    pub total_bases: String,
    #[serde(rename = "@load_date", default)]
    pub load_date: String,
    #[serde(rename = "@published", default)]
    pub release_date: String,
}

/// `PLATFORM` holds one vendor element; each carries an
/// `INSTRUMENT_MODEL`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Platform {
    #[serde(rename = "ILLUMINA", default)]
    pub illumina: Option<Instrument>,
    #[serde(rename = "OXFORD_NANOPORE", default)]
    pub oxford_nanopore: Option<Instrument>,
    #[serde(rename = "PACBIO_SMRT", default)]
    pub pacbio_smrt: Option<Instrument>,
    #[serde(rename = "ION_TORRENT", default)]
    pub ion_torrent: Option<Instrument>,
    #[serde(rename = "BGISEQ", default)]
    pub bgiseq: Option<Instrument>,
    #[serde(rename = "DNBSEQ", default)]
    pub dnbseq: Option<Instrument>,
    #[serde(rename = "LS454", default)]
    pub ls454: Option<Instrument>,
    #[serde(rename = "ELEMENT", default)]
    pub element: Option<Instrument>,
    #[serde(rename = "ULTIMA", default)]
    pub ultima: Option<Instrument>,
}

impl Platform {
    pub fn instrument_model(&self) -> Option<&str> {
        [
            &self.illumina,
            &self.oxford_nanopore,
            &self.pacbio_smrt,
            &self.ion_torrent,
            &self.bgiseq,
            &self.dnbseq,
            &self.ls454,
            &self.element,
            &self.ultima,
        ]
        .into_iter()
        .flatten()
        .map(|instrument| instrument.model.trim())
        .find(|model| !model.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Instrument {
    #[serde(rename = "INSTRUMENT_MODEL", default)]
    pub model: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Organization {
    #[serde(rename = "@type", default)]
    pub kind: String,
    #[serde(rename = "Name", default)]
    pub name: TextNode,
}

/// Element whose text is wanted regardless of any attributes on it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TextNode {
    #[serde(rename = "$text", default)]
    pub value: String,
}

/// Root of an `esearch` response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResult {
    #[serde(rename = "Count", default)]
    pub count: usize,
    #[serde(rename = "RetMax", default)]
    pub ret_max: usize,
    #[serde(rename = "RetStart", default)]
    pub ret_start: usize,
    #[serde(rename = "IdList", default)]
    pub id_list: IdList,
    #[serde(rename = "ERROR", default)]
    pub error: Option<String>,
}

impl SearchResult {
    pub fn ids(&self) -> Vec<Identifier> {
        self.id_list
            .ids
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .map(Identifier::from)
            .collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdList {
    #[serde(rename = "Id", default)]
    pub ids: Vec<String>,
}

const PACKAGE_SET_ROOT: &str = "EXPERIMENT_PACKAGE_SET";
const SEARCH_RESULT_ROOT: &str = "eSearchResult";

pub fn decode_package_set(xml: &str) -> Result<PackageSet, SraMetaError> {
    expect_root(xml, PACKAGE_SET_ROOT)?;
    quick_xml::de::from_str(xml).map_err(|err| SraMetaError::Decode(err.to_string()))
}

pub fn decode_search_result(xml: &str) -> Result<SearchResult, SraMetaError> {
    expect_root(xml, SEARCH_RESULT_ROOT)?;
    quick_xml::de::from_str(xml).map_err(|err| SraMetaError::Decode(err.to_string()))
}

/// The serde mode ignores the root element's name, so error envelopes and
/// HTML pages would otherwise decode as empty documents.
fn expect_root(xml: &str, expected: &str) -> Result<(), SraMetaError> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(tag)) | Ok(Event::Empty(tag)) => {
                let name = tag.name();
                if name.as_ref() == expected.as_bytes() {
                    return Ok(());
                }
                return Err(SraMetaError::Decode(format!(
                    "unexpected root element <{}>, expected <{expected}>",
                    String::from_utf8_lossy(name.as_ref())
                )));
            }
            Ok(Event::Eof) => {
                return Err(SraMetaError::Decode(format!(
                    "empty document, expected <{expected}>"
                )));
            }
            Ok(_) => {}
            Err(err) => return Err(SraMetaError::Decode(err.to_string())),
        }
    }
}
