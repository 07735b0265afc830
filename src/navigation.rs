use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Unauthenticated entry point.
    Home,
    PatientLogin,
    DoctorLogin,
    Register,
    PatientDashboard,
    DoctorDashboard,
}

/// The route stack. Cloning shares the same stack.
#[derive(Debug, Clone)]
pub struct Navigator {
    stack: Arc<Mutex<Vec<Route>>>,
}

impl Default for Navigator {
    fn default() -> Self {
        Navigator {
            stack: Arc::new(Mutex::new(vec![Route::Home])),
        }
    }
}

impl Navigator {
    pub fn navigate(&self, route: Route) {
        self.with_stack(|stack| stack.push(route));
    }

    /// Replaces the whole stack with `route`.
    pub fn reset(&self, route: Route) {
        self.with_stack(|stack| {
            stack.clear();
            stack.push(route);
        });
    }

    pub fn go_back(&self) {
        self.with_stack(|stack| {
            if stack.len() > 1 {
                stack.pop();
            }
        });
    }

    pub fn current(&self) -> Route {
        self.with_stack(|stack| stack.last().copied().unwrap_or(Route::Home))
    }

    pub fn depth(&self) -> usize {
        self.with_stack(|stack| stack.len())
    }

    fn with_stack<T>(&self, f: impl FnOnce(&mut Vec<Route>) -> T) -> T {
        let mut stack = self.stack.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut stack)
    }
}
