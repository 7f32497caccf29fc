use std::collections::HashSet;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use tracing::warn;

use aoilog::model::{CircuitRecord, CircuitStatus, LotKey, LotRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitWrite {
    Inserted,
    Replaced,
    Skipped,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LotWriteStats {
    pub circuits_inserted: usize,
    pub circuits_replaced: usize,
    pub circuits_skipped: usize,
}

pub fn load_existing_lot_keys(connection: &Connection) -> Result<HashSet<LotKey>> {
    let mut statement = connection
        .prepare("SELECT lot_num, machine, layer FROM lot_data")
        .context("failed to prepare lot key query")?;

    let rows = statement.query_map([], |row| {
        Ok(LotKey {
            lot_id: row.get(0)?,
            machine: row.get(1)?,
            layer: row.get(2)?,
        })
    })?;

    let mut keys = HashSet::new();
    for row in rows {
        keys.insert(row.context("failed to read lot key row")?);
    }
    Ok(keys)
}

/// Writes the lot row and its circuits in one transaction.
pub fn store_lot(connection: &mut Connection, lot: &LotRecord) -> Result<LotWriteStats> {
    let tx = connection.transaction()?;

    let inserted = tx
        .execute(
            "
            INSERT INTO lot_data(
              lot_num, machine, layout, layer, start_date, end_date,
              input_es, reviewed_es, good_es, reject_es, output_es, substrate_cnt
            )
            VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ",
            params![
                lot.lot_id,
                &lot.machine,
                &lot.layout,
                &lot.layer,
                lot.start_time,
                lot.end_time,
                lot.input_count,
                lot.reviewed_count,
                lot.good_count,
                lot.reject_count,
                lot.output_count,
                lot.substrate_count,
            ],
        )
        .with_context(|| format!("failed to insert lot {} layer {}", lot.lot_id, lot.layer))?;
    if inserted != 1 {
        warn!(lot_id = lot.lot_id, rows = inserted, "unexpected lot insert row count");
    }

    let mut stats = LotWriteStats::default();
    for circuit in &lot.circuits {
        match write_circuit(&tx, &lot.layer, circuit)? {
            CircuitWrite::Inserted => stats.circuits_inserted += 1,
            CircuitWrite::Replaced => stats.circuits_replaced += 1,
            CircuitWrite::Skipped => stats.circuits_skipped += 1,
        }
    }

    tx.commit()
        .with_context(|| format!("failed to commit lot {}", lot.lot_id))?;
    Ok(stats)
}

fn write_circuit(tx: &Transaction<'_>, layer: &str, circuit: &CircuitRecord) -> Result<CircuitWrite> {
    let key = circuit.key(layer);
    let stored: Option<String> = tx
        .query_row(
            "SELECT status FROM circuit_data
             WHERE lot_num = ?1 AND substrate_num = ?2 AND circuit_num = ?3 AND layer = ?4",
            params![key.lot_id, key.substrate_number, key.circuit_number, &key.layer],
            |row| row.get(0),
        )
        .optional()
        .context("failed to look up stored circuit")?;

    let outcome = match stored {
        None => CircuitWrite::Inserted,
        Some(status) if should_replace(CircuitStatus::parse(&status), circuit.status()) => {
            warn!(
                lot_id = key.lot_id,
                substrate = key.substrate_number,
                circuit = key.circuit_number,
                layer = %key.layer,
                previous = %status,
                "circuit became non-repairable, replacing stored row"
            );
            tx.execute(
                "DELETE FROM circuit_data
                 WHERE lot_num = ?1 AND substrate_num = ?2 AND circuit_num = ?3 AND layer = ?4",
                params![key.lot_id, key.substrate_number, key.circuit_number, &key.layer],
            )?;
            CircuitWrite::Replaced
        }
        Some(_) => return Ok(CircuitWrite::Skipped),
    };

    let (length, breadth, area) = circuit.dimensions();
    tx.execute(
        "
        INSERT INTO circuit_data(
          lot_num, substrate_num, circuit_num, status, length, breadth, area, did_stop, layer
        )
        VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ",
        params![
            key.lot_id,
            key.substrate_number,
            key.circuit_number,
            circuit.status().as_str(),
            length,
            breadth,
            area,
            circuit.did_stop,
            &key.layer,
        ],
    )
    .context("failed to insert circuit")?;

    Ok(outcome)
}

/// A stored circuit is only overwritten when it escalates to non-repairable.
pub fn should_replace(stored: Option<CircuitStatus>, incoming: CircuitStatus) -> bool {
    incoming == CircuitStatus::NonRepairable && stored != Some(CircuitStatus::NonRepairable)
}
