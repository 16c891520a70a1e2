//! A subcommand making sure various things are working. Useful for updating
//! projman where you want to check as many things as possible as early as
//! possible.

use crate::{
    args::{Args, Shared},
    config::Config,
    db::{self, MigrationPlan},
    load_config_and_init_logger,
    prelude::*,
    store::Collection,
};


pub(crate) async fn run(shared: &Shared, args: &Args) -> Result<()> {
    let config = load_config_and_init_logger(shared, args)
        .context("failed to load config: cannot proceed with `check` command")?;

    info!("Starting to verify various things...");
    let migrations = check_db(&config).await;
    info!("Done verifing various things");


    // Print summary after all log output
    let mut any_errors = false;
    println!();
    bunt::println!("{$bold+blue+intense}Summary{/$}");
    println!();
    print_outcome(&mut any_errors, "Load configuration", &Ok(()));
    print_outcome(&mut any_errors, "Connection to DB and migration state", &migrations);

    if let Ok(state) = &migrations {
        match &state.plan {
            MigrationPlan::UpToDate => {
                for (collection, count) in &state.counts {
                    println!("   {collection}: {count} documents");
                }
            }
            MigrationPlan::EmptyDb => println!("   Database is empty, all migrations will be applied"),
            MigrationPlan::Migrate { new_migrations } => {
                println!("   {new_migrations} new migration(s) will be applied on next start");
            }
        }
    }

    println!();
    if any_errors {
        bunt::println!("{$red+intense}➡  Errors have occured!{/$}");
        std::process::exit(1);
    } else {
        bunt::println!("{$green+intense}⮕  Everything OK{/$} \
            {$dimmed}(projman probably works in this environment){/$}");
        Ok(())
    }
}

fn print_outcome<T>(any_errors: &mut bool, label: &str, result: &Result<T>) {
    match result {
        Ok(_) => {
            bunt::println!(" ▸ {[bold+intense]}  {$green+bold}✔ ok{/$}", label);
        }
        Err(e) => {
            *any_errors = true;
            bunt::println!(" ▸ {[bold+intense]}  {$red+bold}✘ error{/$}", label);
            bunt::println!("      {$red}▶▶▶ {$bold}Error:{/$}{/$} {[yellow+intense]}", e);
            println!();
            bunt::println!("      {$red+italic}Caused by:{/$}");

            for (i, cause) in e.chain().skip(1).enumerate() {
                print!("       {: >1$}", "", i * 2);
                println!("‣ {cause}");
            }
            println!();
        }
    }
}

struct DbState {
    plan: MigrationPlan,
    /// Number of documents per collection. Only filled if the schema is up
    /// to date.
    counts: Vec<(Collection, i64)>,
}

/// Connects to the DB and builds the migration plan without applying it.
async fn check_db(config: &Config) -> Result<DbState> {
    let pool = db::create_pool(&config.db).await?;
    let mut conn = pool.get().await?;
    let tx = conn.transaction().await?;
    let plan = MigrationPlan::build(&tx).await?;

    let mut counts = Vec::new();
    if let MigrationPlan::UpToDate = plan {
        for collection in Collection::ALL {
            let count = tx.query_one(&*format!("select count(*) from {collection}"), &[])
                .await
                .context(format!("failed to count documents in '{collection}'"))?
                .get::<_, i64>(0);
            counts.push((collection, count));
        }
    }
    tx.rollback().await?;

    Ok(DbState { plan, counts })
}
