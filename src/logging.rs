//! Inicialização do `tracing` para o binário.
//!
//! Os logs vão para stderr para não se misturarem ao relatório impresso em
//! stdout. `RUST_LOG` tem precedência sobre o nível padrão.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filtro usado quando `RUST_LOG` não está definido.
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose { "docbatch=debug" } else { "docbatch=info" }
}

/// Instala o subscriber global. Chamadas repetidas são ignoradas.
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_switches_to_debug() {
        assert_eq!(default_directive(false), "docbatch=info");
        assert_eq!(default_directive(true), "docbatch=debug");
    }

    #[test]
    fn init_twice_does_not_panic() {
        init(false);
        init(true);
    }
}
