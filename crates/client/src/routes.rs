//! Route table and authentication guard
//!
//! The view layer asks [`guard`] before entering a route. Routes that need a
//! session send anonymous users to the login page; login, registration and
//! password reset pages send authenticated users to the dashboard.

use crate::navigator::{HOME_ROUTE, LOGIN_ROUTE};

/// Who may enter a route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Anyone
    Public,
    /// Only authenticated users
    RequiresAuth,
    /// Only anonymous users: the authentication entry points
    GuestOnly,
}

/// One entry of the route table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub name: &'static str,
    /// Path pattern; segments starting with `:` match any single segment
    pub pattern: &'static str,
    pub access: Access,
    /// Unconditional redirect target
    pub redirect: Option<&'static str>,
}

impl Route {
    const fn new(name: &'static str, pattern: &'static str, access: Access) -> Self {
        Self {
            name,
            pattern,
            access,
            redirect: None,
        }
    }

    fn matches(&self, path: &str) -> bool {
        let mut pattern = segments(self.pattern);
        let mut path = segments(path);
        loop {
            match (pattern.next(), path.next()) {
                (None, None) => return true,
                (Some(expected), Some(actual)) => {
                    if !expected.starts_with(':') && expected != actual {
                        return false;
                    }
                }
                _ => return false,
            }
        }
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

/// Every route of the application, in match order
pub const ROUTES: &[Route] = &[
    Route {
        name: "root",
        pattern: "/",
        access: Access::Public,
        redirect: Some(HOME_ROUTE),
    },
    Route::new("login", "/login", Access::GuestOnly),
    Route::new("register", "/register", Access::GuestOnly),
    Route::new("forgot-password", "/forgot-password", Access::GuestOnly),
    Route::new("reset-password", "/reset-password/:token", Access::GuestOnly),
    Route::new("dashboard", "/dashboard", Access::RequiresAuth),
    Route::new("workouts", "/workouts", Access::RequiresAuth),
    Route::new("log-workout", "/workouts/log", Access::RequiresAuth),
    Route::new("performance", "/performance", Access::RequiresAuth),
    Route::new("pr-history", "/prs", Access::RequiresAuth),
    Route::new("profile", "/profile", Access::RequiresAuth),
    Route::new("settings", "/settings", Access::RequiresAuth),
];

/// Fallback for paths no route matches
pub const NOT_FOUND: Route = Route::new("not-found", "/*", Access::Public);

/// Find the route for `path`; unknown paths resolve to [`NOT_FOUND`]
pub fn resolve(path: &str) -> &'static Route {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    ROUTES
        .iter()
        .find(|route| route.matches(path))
        .unwrap_or(&NOT_FOUND)
}

/// Outcome of the guard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Proceed(&'static Route),
    Redirect(&'static str),
}

/// Decide whether a user may enter `path`
pub fn guard(path: &str, is_authenticated: bool) -> Navigation {
    let route = resolve(path);
    if let Some(target) = route.redirect {
        return Navigation::Redirect(target);
    }

    match route.access {
        Access::RequiresAuth if !is_authenticated => Navigation::Redirect(LOGIN_ROUTE),
        Access::GuestOnly if is_authenticated => Navigation::Redirect(HOME_ROUTE),
        _ => Navigation::Proceed(route),
    }
}
