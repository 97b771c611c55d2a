//! # capi-core: The language of C-API
//!
//! Everything a gateway needs to agree on before a single byte goes over the
//! network: the parsed [`Condition`], the per-deployment
//! [`CapabilitySet`], the [`parser::FilterParser`] that turns a filter
//! expression into conditions, the [`translate`] layer between generic and
//! source vocabularies, and the canonical [`Measurement`] record every source
//! is normalized into.
//!
//! This crate performs no I/O. Adapters and the fan-out orchestrator live in
//! `capi-hub`.

pub mod capability;
pub mod condition;
pub mod filter;
pub mod geo;
pub mod measurement;
pub mod parser;
pub mod source;
pub mod translate;

pub use capability::{CapabilitySet, ConnectorCapability, DataCategory, QueryType};
pub use condition::{CompareMethod, CompareValue, Condition, DataType};
pub use measurement::{
    ErrorResponse, Geometry, Measurement, MeasurementList, MeasurementObject, MeasurementResponse,
    SourceCodeName, SourceError, SourceErrorType, Statistics,
};
pub use parser::{ErrorType, FilterParser, ParseOutcome, ParserError};
pub use source::{AuthenticationData, DataBody, Plugin, SourceDefinition};
pub use translate::Map;
