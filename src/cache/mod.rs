/*!
 * Caches of compiled output.
 *
 * Both caches live in the records they belong to: a variant holds its
 * translated fragment, a songbook holds a pointer to its published document.
 */

pub mod fragment;
pub mod publish;

pub use self::fragment::FragmentCache;
pub use self::publish::{PublishCache, SweepReport};
