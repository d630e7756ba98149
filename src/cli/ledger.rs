use std::error::Error;

use super::Commands;
use crate::account::{Registration, UserAccount};
use crate::init::Services;

pub fn handle_command(services: &mut Services, cmd: Commands) -> Result<(), Box<dyn Error>> {
    let registry = &mut services.registry;

    match cmd {
        Commands::Register { id, password, name, email } => {
            let mut registration = Registration::new(id, password);
            registration.display_name = name;
            registration.email = email;
            let account = registry.register(registration)?;
            println!("Account '{}' registered.", account.id);
        }
        Commands::Login { id, password } => {
            let account = registry.authenticate(&id, &password)?;
            print_account(&account);
            registry.logout();
        }
        Commands::Lookup { id } => {
            print_account(&registry.lookup(&id)?);
        }
        Commands::List => {
            for account in registry.accounts() {
                println!(
                    "{}\tbalance: {}\tlifetime: {}",
                    account.id, account.balance, account.lifetime_earned
                );
            }
        }
        Commands::SetBalance { id, amount } => {
            print_account(&registry.set_absolute_balance(&id, amount)?);
        }
        Commands::Delta { id, password, amount } => {
            registry.authenticate(&id, &password)?;
            let account = registry.apply_delta_to_active(amount);
            registry.logout();
            print_account(&account?);
        }
        Commands::Withdraw { id, password, amount } => {
            registry.authenticate(&id, &password)?;
            let request = registry.request_withdrawal(amount);
            registry.logout();
            let request = request?;
            println!("Withdrawal {} of {} requested.", request.id, request.amount);
        }
        Commands::History { id } => {
            registry.lookup(&id)?;
            for entry in registry.history(&id) {
                println!(
                    "{}\t{:?}\t{:+}\tbalance: {}\tlifetime: {}",
                    entry.at.to_rfc3339(),
                    entry.kind,
                    entry.amount,
                    entry.balance_after,
                    entry.lifetime_after
                );
            }
            for request in registry.withdrawals(&id) {
                println!("withdrawal {}\t{}\t{:?}", request.id, request.amount, request.status);
            }
            println!("Pending withdrawals: {}", registry.pending_withdrawal_total(&id));
        }
        Commands::Sync => {
            let report = services.reconciler.sync();
            println!(
                "Mirrored {} key(s), restored {} key(s).",
                report.to_secondary, report.to_primary
            );
        }
        Commands::Purge => {
            let removed = services.store.purge_non_persistent();
            println!("Removed {} ephemeral key(s).", removed);
        }
        Commands::Reset { wipe } => {
            if wipe {
                let cleared = services.store.clear_all();
                println!("Cleared {} key(s) from the primary tier.", cleared);
            }
            registry.reset_all();
            println!("Ledger reset; {} account(s) reloaded.", registry.accounts().len());
        }
    }
    Ok(())
}

fn print_account(account: &UserAccount) {
    println!("Account: {}", account.id);
    if let Some(name) = &account.display_name {
        println!("  Name: {}", name);
    }
    if let Some(email) = &account.email {
        println!("  Email: {}", email);
    }
    println!("  Balance: {}", account.balance);
    println!("  Lifetime earned: {}", account.lifetime_earned);
    println!("  Status: {:?}", account.status);
    println!("  Joined: {}", account.joined_at.to_rfc3339());
    if let Some(at) = account.last_login {
        println!("  Last login: {}", at.to_rfc3339());
    }
}
