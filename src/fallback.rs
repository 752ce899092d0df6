/// Fallback Chain Module
///
/// An ordered list of strategies that produce the same kind of value. The
/// chain tries them in order and stops at the first success, so the fallback
/// order is data rather than nested error handling.

use async_trait::async_trait;

use crate::content::GenerationError;

/// One way of producing `T` from `I`
#[async_trait]
pub trait Strategy<I: Sync + ?Sized, T>: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    async fn attempt(&self, input: &I) -> Result<T, GenerationError>;
}

pub struct FallbackChain<I: Sync + ?Sized, T> {
    strategies: Vec<Box<dyn Strategy<I, T>>>,
}

impl<I: Sync + ?Sized, T> FallbackChain<I, T> {
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Append a strategy to the end of the chain
    pub fn then(mut self, strategy: impl Strategy<I, T> + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    /// Run strategies in order, returning the first success together with the
    /// name of the strategy that produced it. `None` when every strategy failed.
    pub async fn run(&self, input: &I) -> Option<(T, &str)> {
        for strategy in &self.strategies {
            match strategy.attempt(input).await {
                Ok(value) => return Some((value, strategy.name())),
                Err(e) => {
                    log::warn!("{} failed: {}", strategy.name(), e);
                }
            }
        }

        log::error!("All {} strategies failed", self.strategies.len());
        None
    }
}

impl<I: Sync + ?Sized, T> Default for FallbackChain<I, T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Fixed {
        name: &'static str,
        result: Option<&'static str>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Strategy<str, String> for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        async fn attempt(&self, input: &str) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.result {
                Some(value) => Ok(format!("{value}:{input}")),
                None => Err(GenerationError::Empty),
            }
        }
    }

    fn fixed(name: &'static str, result: Option<&'static str>) -> (Fixed, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Fixed {
                name,
                result,
                calls: calls.clone(),
            },
            calls,
        )
    }

    #[tokio::test]
    async fn stops_at_first_success() {
        let (first, first_calls) = fixed("first", Some("a"));
        let (second, second_calls) = fixed("second", Some("b"));
        let chain = FallbackChain::<str, String>::new().then(first).then(second);

        let (value, name) = chain.run("topic").await.unwrap();

        assert_eq!(value, "a:topic");
        assert_eq!(name, "first");
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn falls_through_in_order() {
        let (first, _) = fixed("first", None);
        let (second, _) = fixed("second", None);
        let (third, _) = fixed("third", Some("c"));
        let chain = FallbackChain::<str, String>::new().then(first).then(second).then(third);

        let (value, name) = chain.run("x").await.unwrap();
        assert_eq!(value, "c:x");
        assert_eq!(name, "third");
    }

    #[tokio::test]
    async fn all_failing_yields_none() {
        let (only, calls) = fixed("only", None);
        let chain = FallbackChain::<str, String>::new().then(only);

        assert!(chain.run("x").await.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
