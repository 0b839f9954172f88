#![allow(missing_docs)]
#![allow(dead_code)]

use rstest::fixture;
pub use test_utils::init_tracer;
use test_utils::ProviderImpl;

#[fixture]
pub fn provider() -> ProviderImpl {
    ProviderImpl::new()
}
