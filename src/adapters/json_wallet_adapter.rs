//! JSON file-backed [`CapitalLedger`].

use crate::domain::error::GymError;
use crate::domain::wallet::Wallet;
use crate::ports::capital_port::CapitalLedger;
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Loads the wallet once at construction and rewrites the file after every
/// mutation. Writes go to a sibling temp file that is renamed into place.
pub struct JsonWalletAdapter {
    path: PathBuf,
    wallet: Wallet,
    min_reserve: f64,
}

impl JsonWalletAdapter {
    /// Opens `path`, creating a wallet holding `opening_balance` if the file
    /// does not exist.
    pub fn open(
        path: impl Into<PathBuf>,
        opening_balance: f64,
        min_reserve: f64,
        today: NaiveDate,
    ) -> Result<Self, GymError> {
        let path = path.into();
        let wallet = if path.exists() {
            let content = fs::read_to_string(&path)?;
            serde_json::from_str(&content).map_err(|e| GymError::Wallet {
                reason: format!("corrupt wallet file {}: {}", path.display(), e),
            })?
        } else {
            info!(path = %path.display(), opening_balance, "creating wallet");
            let wallet = Wallet::new(opening_balance, today);
            write_atomic(&path, &wallet)?;
            wallet
        };
        Ok(Self {
            path,
            wallet,
            min_reserve,
        })
    }

    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), GymError> {
        write_atomic(&self.path, &self.wallet)
    }
}

fn write_atomic(path: &Path, wallet: &Wallet) -> Result<(), GymError> {
    let json = serde_json::to_string_pretty(wallet)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

impl CapitalLedger for JsonWalletAdapter {
    fn available(&self) -> f64 {
        self.wallet.balance
    }

    fn in_use(&self) -> f64 {
        self.wallet.in_use
    }

    fn reserve(&mut self) -> Result<f64, GymError> {
        let amount = self.wallet.reserve(self.min_reserve);
        if amount > 0.0 {
            self.flush()?;
            info!(amount, "reserved capital");
        } else {
            info!(
                available = self.wallet.balance,
                min_reserve = self.min_reserve,
                "balance below minimum, nothing reserved"
            );
        }
        Ok(amount)
    }

    fn release(&mut self, amount: f64) -> Result<f64, GymError> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(GymError::Wallet {
                reason: format!("cannot release {amount}"),
            });
        }
        let returned = self.wallet.release(amount);
        self.flush()?;
        info!(amount = returned, "released capital");
        Ok(returned)
    }

    fn sync_balance(&mut self, exchange_balance: f64, today: NaiveDate) -> Result<(), GymError> {
        if !exchange_balance.is_finite() || exchange_balance < 0.0 {
            return Err(GymError::Wallet {
                reason: format!("invalid exchange balance {exchange_balance}"),
            });
        }
        let new_day = self.wallet.reference_date != today;
        self.wallet.sync(exchange_balance, today);
        self.flush()?;
        info!(exchange_balance, new_day, "synced wallet");
        Ok(())
    }

    fn daily_pnl(&self) -> (f64, f64) {
        self.wallet.daily_pnl()
    }
}
