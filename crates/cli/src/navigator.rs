use actalog_client::Navigator;
use actalog_client::navigator::LOGIN_ROUTE;
use tracing::info;

/// Tells the person at the terminal where the client wants to send them
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn navigate(&self, route: &str) {
        info!(route, "Navigation requested");
        if route == LOGIN_ROUTE {
            eprintln!("Your session has ended. Run `actalog login` to sign in again.");
        } else {
            eprintln!("Continue at {route}");
        }
    }
}
