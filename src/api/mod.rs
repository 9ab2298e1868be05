pub mod translate;
pub mod webdriver;
pub mod zenquotes;
