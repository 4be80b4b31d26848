pub mod count_impl;
pub use count_impl::*;

pub mod sum_impl;
pub use sum_impl::*;

pub mod avg_impl;
pub use avg_impl::*;

pub mod approx_count_impl;
pub use approx_count_impl::*;

pub mod count_distinct_impl;
pub use count_distinct_impl::*;
