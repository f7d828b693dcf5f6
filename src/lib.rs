//! Meridional overturning circulation (MOC) diagnostics for unstructured
//! triangular ocean-model meshes: latitude-binned, area-weighted integration
//! of vertical velocities into a depth x latitude streamfunction, bottom
//! topography envelopes for plotting, and annual cell-strength time series.

pub mod basin;
pub mod config;
pub mod field;
pub mod mesh;
pub mod moc;
pub mod readers;
pub mod tseries;
