//! Basic example of the Rabt DI container.

use rabt::prelude::*;
use std::sync::Arc;

// === Define your traits and types ===

trait Logger: Send + Sync {
    fn log(&self, msg: &str);
}

struct ConsoleLogger;

impl Logger for ConsoleLogger {
    fn log(&self, msg: &str) {
        println!("[LOG] {msg}");
    }
}

type SharedLogger = Arc<dyn Logger>;

struct Config {
    database_url: String,
    debug: bool,
}

struct Database {
    url: String,
    logger: SharedLogger,
}

impl Database {
    fn query(&self, sql: &str) -> String {
        self.logger.log(&format!("Executing: {sql}"));
        format!("Results from {}", self.url)
    }
}

impl Injectable<Database> for Database {
    fn inject(resolver: &dyn Resolver) -> Result<Database> {
        let config: Arc<Config> = resolver.get_required_service()?;
        let logger: Arc<SharedLogger> = resolver.get_required_service()?;
        Ok(Database {
            url: config.database_url.clone(),
            logger: Arc::clone(&*logger),
        })
    }
}

impl Dispose for Database {
    fn dispose(&self) -> DisposeResult {
        self.logger.log(&format!("Closing connection to {}", self.url));
        Ok(())
    }
}

struct UserRepository {
    db: Arc<Database>,
}

impl UserRepository {
    fn find_user(&self, id: u64) -> String {
        self.db.query(&format!("SELECT * FROM users WHERE id = {id}"))
    }
}

struct UserService {
    repo: Arc<UserRepository>,
    logger: SharedLogger,
}

impl UserService {
    fn get_user(&self, id: u64) -> String {
        self.logger.log(&format!("Getting user {id}"));
        self.repo.find_user(id)
    }
}

fn main() -> Result<()> {
    // Initialize tracing (logging)
    tracing_subscriber::fmt()
        .with_env_filter("rabt_container=debug")
        .init();

    let mut services = ServiceCollection::new();
    services
        // Config: pre-built instance
        .add(ServiceDescriptor::instance(Config {
            database_url: "postgres://localhost/myapp".to_string(),
            debug: true,
        }))
        // Logger: singleton behind a trait object
        .add(ServiceDescriptor::singleton_factory::<SharedLogger, _>(|_| {
            Ok(Arc::new(ConsoleLogger) as SharedLogger)
        }))
        // Database: singleton activated from its Injectable impl, closed on dispose
        .add(
            ServiceDescriptor::describe::<Database>(Lifetime::Singleton)
                .implementation::<Database>()
                .disposable()
                .build()?,
        )
        // UserRepository: scoped (one per request)
        .add(ServiceDescriptor::scoped_factory(|r| {
            let db: Arc<Database> = r.get_required_service()?;
            Ok(UserRepository { db })
        }))
        // UserService: transient (new each time)
        .add(ServiceDescriptor::transient_factory(|r| {
            let repo: Arc<UserRepository> = r.get_required_service()?;
            let logger: Arc<SharedLogger> = r.get_required_service()?;
            Ok(UserService {
                repo,
                logger: Arc::clone(&*logger),
            })
        }))
        .add_type_activator();

    let provider = services.build();
    println!("✅ Provider built successfully!");
    println!("{provider:?}");

    // === Resolve from the root provider ===
    let config: Arc<Config> = provider.get_required_service()?;
    println!("📋 Config: database_url={}, debug={}", config.database_url, config.debug);

    // === Create a scope (e.g., for an HTTP request) ===
    {
        let scope = provider.create_scope();

        let service: Arc<UserService> = scope.get_required_service()?;
        println!("👤 {}", service.get_user(42));

        // Resolve again in same scope: UserRepository is reused
        let service2: Arc<UserService> = scope.get_required_service()?;
        println!("👤 {}", service2.get_user(7));
        println!("🔁 same repository: {}", Arc::ptr_eq(&service.repo, &service2.repo));

        scope.dispose()?;
    }

    // === Missing services explain themselves ===
    if let Err(err) = provider.get_required_service::<u64>() {
        println!("⚠️  {err}");
    }

    provider.dispose()?;
    println!("\n🎉 Everything works!");
    Ok(())
}
