pub mod cctv;
pub mod cctv_list;

pub use cctv::CctvExtractor;
pub use cctv_list::CctvListExtractor;
