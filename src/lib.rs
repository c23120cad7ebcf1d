/*!
# Chartsheet

A web application for turning uploaded Excel spreadsheets into charts,
built in Rust.

## Overview

Users register, upload `.xls`/`.xlsx` files, and build charts from the
parsed data. Uploads are flattened to header-keyed rows, columns are
classified as numeric or textual from a prefix sample, and the chosen
axes are projected into the parallel arrays the chart renderer consumes.
A secondary admin role reviews "become an admin" requests and manages
users, their files and their saved charts.

## Architecture

### Ingestion pipeline
- **Sheet Flattener** (`flatten`) - First worksheet to a matrix or to
  header-keyed row objects, via calamine
- **Value Coercion** (`coerce`) - Numeric sniffing with `$`/`%`/`,`
  stripping
- **Column Type Inference** (`infer`) - Prefix-sampled numeric/text
  classification for the axis picker
- **Chart Data Projector** (`project`) - Rows plus axis keys to parallel
  X/Y(/Z) arrays, dropping uncoercible numeric entries

### Persistence
- **Upload Ledger** (`ledger`) - Per-user JSON upload records,
  de-duplicated by filename
- **Chart Store** (`charts`) - Saved chart configurations behind a
  storage trait, JSON-file backend

### Web layer
- **Auth** (`login`) - Argon2 password hashing, cookie sessions, a closed
  user/admin role enum
- **Admin** (`admin`) - Admin-request review workflow and management
  endpoints
- **Rendering** (`render`) - Server-side PNG charts with plotters
- **Routing** (`app`) - axum router, multipart upload handling
- **Export** (`export`) - CSV download of stored uploads

## Modules

- **cell**: Cell value type shared by the whole pipeline
- **coerce**: Numeric coercion of loosely-typed cells
- **flatten**: Workbook bytes to rows
- **infer**: Column classification
- **project**: Axis projection for charts
- **ledger**: Upload persistence
- **login**: Users, sessions and auth handlers
- **admin**: Admin workflow and management handlers
- **charts**: Chart configs, storage and chart API handlers
- **render**: PNG chart rendering
- **export**: CSV export
- **app**: Router and upload endpoint
*/

pub mod admin;
pub mod app;
pub mod cell;
pub mod charts;
pub mod coerce;
pub mod export;
pub mod flatten;
pub mod infer;
pub mod ledger;
pub mod login;
pub mod project;
pub mod render;

pub use cell::{CellValue, ParsedRow};
pub use coerce::{coerce_numeric, is_numeric};
pub use flatten::{FlattenError, SheetData, flatten_matrix, flatten_objects};
pub use infer::{ColumnDescriptor, ColumnKind, describe_columns, infer_column_type};
pub use ledger::{UploadLedger, UploadRecord, UploadSummary};
pub use project::{ChartProjection, project};
