pub mod annuaire;
pub mod browser;
pub mod clean;
pub mod consent;
pub mod drivers;
pub mod extract;
pub mod item;
pub mod maps;
pub mod session;
pub mod site;
#[cfg(test)]
pub mod testing;
pub mod traits;
pub mod types;

pub use site::DirectoryScraper;
pub use traits::ScraperTrait;
pub use types::SearchParams;
