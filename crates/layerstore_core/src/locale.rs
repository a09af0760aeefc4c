//! Caller locale context.
//!
//! # Responsibility
//! - Hold the current locale for synchronous callers (per thread) and async
//!   tasks (per task).
//! - Let the bridge capture a caller's locale and re-apply it elsewhere.
//!
//! # Invariants
//! - A task-scoped locale shadows the thread locale while the task runs.
//! - `with_thread_locale` restores the previous thread locale on exit, even
//!   when the closure panics.

use std::cell::RefCell;
use std::fmt::{Display, Formatter};
use std::future::Future;

const INVARIANT_TAG: &str = "und";

thread_local! {
    static THREAD_LOCALE: RefCell<Option<Locale>> = const { RefCell::new(None) };
}

tokio::task_local! {
    static TASK_LOCALE: Locale;
}

/// BCP-47 style language tag, e.g. `en-US`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locale(String);

impl Locale {
    /// Builds a locale from a tag; blank tags map to the invariant locale.
    pub fn new(tag: impl AsRef<str>) -> Self {
        let trimmed = tag.as_ref().trim();
        if trimmed.is_empty() {
            return Self::invariant();
        }
        Self(trimmed.to_string())
    }

    pub fn invariant() -> Self {
        Self(INVARIANT_TAG.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Task locale if inside a scoped task, else thread locale, else invariant.
    pub fn current() -> Self {
        TASK_LOCALE
            .try_with(Clone::clone)
            .ok()
            .or_else(|| THREAD_LOCALE.with(|slot| slot.borrow().clone()))
            .unwrap_or_else(Self::invariant)
    }

    /// Sets the calling thread's locale, returning the previous one.
    pub fn set_current(locale: Locale) -> Option<Locale> {
        THREAD_LOCALE.with(|slot| slot.borrow_mut().replace(locale))
    }
}

impl Default for Locale {
    fn default() -> Self {
        Self::invariant()
    }
}

impl Display for Locale {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Runs `future` with `locale` as its task locale.
pub fn scope<F: Future>(locale: Locale, future: F) -> impl Future<Output = F::Output> {
    TASK_LOCALE.scope(locale, future)
}

/// Runs `work` with `locale` as the thread locale, then restores the previous.
pub fn with_thread_locale<R>(locale: Locale, work: impl FnOnce() -> R) -> R {
    struct Restore(Option<Locale>);

    impl Drop for Restore {
        fn drop(&mut self) {
            let previous = self.0.take();
            THREAD_LOCALE.with(|slot| *slot.borrow_mut() = previous);
        }
    }

    let _restore = Restore(Locale::set_current(locale));
    work()
}

#[cfg(test)]
mod tests {
    use super::{scope, with_thread_locale, Locale};

    #[test]
    fn blank_tag_is_invariant() {
        assert_eq!(Locale::new("  "), Locale::invariant());
        assert_eq!(Locale::new(" fr-CA ").as_str(), "fr-CA");
    }

    #[test]
    fn thread_locale_is_restored_after_scope() {
        std::thread::spawn(|| {
            assert_eq!(Locale::current(), Locale::invariant());
            let seen = with_thread_locale(Locale::new("de-DE"), Locale::current);
            assert_eq!(seen.as_str(), "de-DE");
            assert_eq!(Locale::current(), Locale::invariant());
        })
        .join()
        .unwrap();
    }

    #[tokio::test]
    async fn task_locale_shadows_thread_locale() {
        let seen = scope(Locale::new("pt-BR"), async { Locale::current() }).await;
        assert_eq!(seen.as_str(), "pt-BR");
    }
}
