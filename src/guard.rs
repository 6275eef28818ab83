//! 熔断保护适配器
//!
//! 把“产生异步操作的函数”包装成受熔断器保护的函数：每次调用都会生成一个
//! [`Deferred`] 并立即交给 [`CircuitBreaker::run`]。多个操作可以共享同一个熔断器。

use crate::circuit_breaker::CircuitBreaker;
use crate::deferred::Deferred;
use crate::error::CallError;
use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// 受熔断器保护的操作
///
/// 保留被包装操作的名称和引用，便于检查。
///
/// # 示例
/// ```rust
/// use breakeron::circuit_breaker::{BreakerConfig, CircuitBreaker};
/// use breakeron::guard::guard;
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() {
/// let breaker = Arc::new(CircuitBreaker::new("users", BreakerConfig::new(3)).unwrap());
/// let fetch_user = guard(&breaker, "fetch_user", |id: u64| async move {
///     Ok::<_, std::io::Error>(format!("user-{}", id))
/// });
///
/// assert_eq!(fetch_user.call(7).await.unwrap(), "user-7");
/// assert_eq!(fetch_user.name(), "fetch_user");
/// # }
/// ```
pub struct Guarded<F> {
    name: String,
    breaker: Arc<CircuitBreaker>,
    operation: Arc<F>,
}

impl<F> Guarded<F> {
    pub fn new(name: impl Into<String>, breaker: Arc<CircuitBreaker>, operation: F) -> Self {
        Self {
            name: name.into(),
            breaker,
            operation: Arc::new(operation),
        }
    }

    /// 被包装操作的名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 保护该操作的熔断器
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// 被包装的原始操作
    pub fn operation(&self) -> &F {
        &self.operation
    }

    /// 通过熔断器调用操作
    ///
    /// 多个参数可以用元组传入。熔断器打开时操作不会被调用。
    pub async fn call<A, Fut, T, E>(&self, args: A) -> Result<T, CallError<E>>
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        A: Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: 'static,
        E: StdError + Send + Sync + 'static,
    {
        let operation = Arc::clone(&self.operation);
        self.breaker
            .run(Deferred::new(move || operation(args)))
            .await
    }
}

impl<F> Clone for Guarded<F> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            breaker: Arc::clone(&self.breaker),
            operation: Arc::clone(&self.operation),
        }
    }
}

impl<F> fmt::Debug for Guarded<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guarded")
            .field("name", &self.name)
            .field("breaker", &self.breaker.name())
            .finish()
    }
}

/// 用熔断器保护一个操作
pub fn guard<F>(breaker: &Arc<CircuitBreaker>, name: impl Into<String>, operation: F) -> Guarded<F> {
    Guarded::new(name, Arc::clone(breaker), operation)
}
