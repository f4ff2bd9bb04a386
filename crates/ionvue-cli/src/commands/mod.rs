pub mod info;
pub mod rangeconvert;
pub mod rangeinfo;
pub mod sample;
pub mod stateinfo;
