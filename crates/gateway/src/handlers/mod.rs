//! API handlers module

pub mod health;
pub mod historico;
pub mod pesquisa;
pub mod response;
