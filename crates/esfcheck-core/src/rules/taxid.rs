//! Tax-ID rules: presence and format, equality, checksum.

use super::texts::{failure, success};
use super::{Rule, RuleContext, RuleOutcome};
use crate::error::RuleFault;
use crate::extract::{Role, checksum_valid, is_valid_tax_id};
use crate::models::document::Document;
use crate::models::finding::{Finding, Level};
use crate::normalize::only_digits;

fn tax_id(doc: &Document, role: Role) -> &str {
    match role {
        Role::Supplier => doc.supplier_tax_id.trim(),
        Role::Buyer => doc.buyer_tax_id.trim(),
    }
}

fn party(role: Role) -> &'static str {
    match role {
        Role::Supplier => "поставщика",
        Role::Buyer => "покупателя",
    }
}

/// BIN001 / BIN002: the role's identifier is present and has 12 digits.
pub struct TaxIdFormat {
    role: Role,
}

impl TaxIdFormat {
    pub fn supplier() -> Self {
        Self { role: Role::Supplier }
    }

    pub fn buyer() -> Self {
        Self { role: Role::Buyer }
    }
}

impl Rule for TaxIdFormat {
    fn code(&self) -> &'static str {
        match self.role {
            Role::Supplier => "BIN001",
            Role::Buyer => "BIN002",
        }
    }

    fn check(&self, doc: &Document, ctx: &RuleContext<'_>) -> Result<RuleOutcome, RuleFault> {
        let code = self.code();
        let value = tax_id(doc, self.role);
        let provenance = doc.locator(self.role.field());

        if value.is_empty() {
            return Ok(failure(ctx.config, code, ctx.config.severity_for(code, Level::Error)).into());
        }
        let finding = if is_valid_tax_id(value) {
            success(ctx.config, code, Level::Ok)
        } else {
            failure(ctx.config, code, ctx.config.severity_for(code, Level::Error))
        };
        Ok(finding.with_value(value).with_provenance(provenance).into())
    }
}

/// BIN007: supplier and buyer are different parties.
pub struct TaxIdEquality;

impl Rule for TaxIdEquality {
    fn code(&self) -> &'static str {
        "BIN007"
    }

    fn check(&self, doc: &Document, ctx: &RuleContext<'_>) -> Result<RuleOutcome, RuleFault> {
        let supplier = tax_id(doc, Role::Supplier);
        let buyer = tax_id(doc, Role::Buyer);
        if supplier.is_empty() || buyer.is_empty() {
            return Ok(RuleOutcome::Suppressed);
        }

        let value = format!("{}/{}", supplier, buyer);
        let finding = if only_digits(supplier) != only_digits(buyer) {
            success(ctx.config, self.code(), Level::Ok)
        } else if ctx.config.tax_id.allow_equal {
            Finding::new(self.code(), Level::Info, "БИНы совпадают (разрешено)")
        } else {
            failure(ctx.config, self.code(), ctx.config.severity_for(self.code(), Level::Warn))
        };
        Ok(finding.with_value(value).into())
    }
}

/// BIN012: modulo-11 checksum of each valid identifier. Off unless enabled.
pub struct TaxIdChecksum;

impl Rule for TaxIdChecksum {
    fn code(&self) -> &'static str {
        "BIN012"
    }

    fn check(&self, doc: &Document, ctx: &RuleContext<'_>) -> Result<RuleOutcome, RuleFault> {
        if !ctx.config.tax_id.checksum_enabled {
            return Ok(RuleOutcome::Suppressed);
        }

        let code = self.code();
        let findings = Role::ALL
            .into_iter()
            .filter(|role| is_valid_tax_id(tax_id(doc, *role)))
            .map(|role| {
                let value = tax_id(doc, role);
                let mut finding = if checksum_valid(value) {
                    success(ctx.config, code, Level::Ok)
                } else {
                    failure(ctx.config, code, ctx.config.severity_for(code, Level::Error))
                };
                finding.title = format!("{} ({})", finding.title, party(role));
                finding.with_value(value).with_provenance(doc.locator(role.field()))
            })
            .collect();
        Ok(RuleOutcome::Many(findings))
    }
}
