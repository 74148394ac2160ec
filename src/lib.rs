/*!
# Sheetdesk

A workbook editor engine: typed sheets, cell coercion, structural edits and
a paginated table projection, backed by a tenant-scoped workbook store.

## Overview

A workbook is an ordered list of sheets. Each sheet has typed columns
(`string`, `number`, `boolean`, `date`, `datetime`, `time`) and rows of
cells aligned to them. Changing a column's type re-coerces every cell in
that column; lossy conversions are accepted and yield `NaN` or `null`.

## Architecture

### Engine
- **Coercion**: total conversion of any raw value into a column type
- **Mutation Engine**: rename, retype, delete columns/rows, header
  promotion, cell edits; sheets are shared between snapshots until edited
- **Row Filtering**: blank-row detection for export and cleanup

### Presentation
- **Projection**: sheet + mode flags to column specs with editors,
  validators and formatters
- **Table Host**: owns at most one live rendered table

### Persistence
- Gzip-compressed JSON workbooks, one directory per tenant
- Response envelopes `{"success", "data": {"data", "id"}}` detected at load
- CSV import with type inference, CSV and XLSX export

## Modules

- **value**: stored cell values and raw input values
- **coerce**: column types and the coercion rules
- **workbook**: workbook, sheet and column model with structural edits
- **filter**: blank-row filtering
- **envelope**: response unwrapping and wrapping
- **present**: table projection, dropdowns, renderer seam
- **session**: explicit editor session state
- **service**: workbook service trait and the local store
- **loader**: CSV and JSON import
- **saving**: compressed workbook files
- **downloader**: CSV and XLSX export
- **config**: command line configuration
- **error**: error types per layer
*/

pub mod coerce;
pub mod config;
pub mod downloader;
pub mod envelope;
pub mod error;
pub mod filter;
pub mod loader;
pub mod present;
pub mod saving;
pub mod service;
pub mod session;
pub mod value;
pub mod workbook;

/// Re-export everything from these modules to make it easier to use
pub use coerce::*;
pub use downloader::*;
pub use envelope::*;
pub use error::*;
pub use filter::*;
pub use loader::*;
pub use present::*;
pub use saving::*;
pub use service::*;
pub use session::*;
pub use value::*;
pub use workbook::*;
