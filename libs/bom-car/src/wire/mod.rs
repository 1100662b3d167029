//! Low-level ("wire") access to BOM containers and the CAR records stored in them

pub mod bom;
pub mod car;
pub mod fourcc;
pub mod schema;

#[cfg(test)]
pub(crate) mod testing;
