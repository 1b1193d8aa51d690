//! Row fixtures shared by the engine tests

use libsql::{params, Connection};

pub async fn insert_vehicle(conn: &Connection, id: i64, contract_id: i64, plate: &str, at: i64) {
    conn.execute(
        "INSERT INTO vehicles (id, contract_id, plate, model, active, created_at, updated_at)
         VALUES (?, ?, ?, 'Hilux', 1, ?, ?)",
        params![id, contract_id, plate, at, at],
    )
    .await
    .unwrap();
}

pub async fn insert_checklist(conn: &Connection, id: i64, contract_id: i64, title: &str, at: i64) {
    conn.execute(
        "INSERT INTO checklists (id, contract_id, title, category, questions, created_at, updated_at)
         VALUES (?, ?, ?, 'safety', '[\"helmet?\"]', ?, ?)",
        params![id, contract_id, title, at, at],
    )
    .await
    .unwrap();
}

pub async fn insert_team(conn: &Connection, id: i64, contract_id: i64, name: &str, at: i64) {
    conn.execute(
        "INSERT INTO teams (id, contract_id, name, shift, created_at, updated_at)
         VALUES (?, ?, ?, 'day', ?, ?)",
        params![id, contract_id, name, at, at],
    )
    .await
    .unwrap();
}

pub async fn insert_member(conn: &Connection, id: i64, team_id: i64, name: &str, at: i64) {
    conn.execute(
        "INSERT INTO team_members (id, team_id, name, role, created_at, updated_at)
         VALUES (?, ?, ?, 'electrician', ?, ?)",
        params![id, team_id, name, at, at],
    )
    .await
    .unwrap();
}

pub async fn insert_material(conn: &Connection, id: i64, code: &str, at: i64) {
    conn.execute(
        "INSERT INTO materials (id, code, description, unit, unit_price, created_at, updated_at)
         VALUES (?, ?, 'cable', 'm', 2.5, ?, ?)",
        params![id, code, at, at],
    )
    .await
    .unwrap();
}

pub async fn link_material(conn: &Connection, id: i64, contract_id: i64, material_id: i64, at: i64) {
    conn.execute(
        "INSERT INTO contract_materials (id, contract_id, material_id, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?)",
        params![id, contract_id, material_id, at, at],
    )
    .await
    .unwrap();
}

pub async fn touch(conn: &Connection, table: &str, id: i64, at: i64) {
    conn.execute(
        &format!("UPDATE {table} SET updated_at = ? WHERE id = ?"),
        params![at, id],
    )
    .await
    .unwrap();
}

pub async fn soft_delete(conn: &Connection, table: &str, id: i64, at: i64) {
    conn.execute(
        &format!("UPDATE {table} SET deleted_at = ?, updated_at = ? WHERE id = ?"),
        params![at, at, id],
    )
    .await
    .unwrap();
}

pub async fn grant_contract(conn: &Connection, user_id: &str, contract_id: i64) {
    conn.execute(
        "INSERT INTO user_contracts (user_id, contract_id, granted_at, revoked_at)
         VALUES (?, ?, 0, NULL)
         ON CONFLICT (user_id, contract_id) DO UPDATE SET revoked_at = NULL",
        params![user_id, contract_id],
    )
    .await
    .unwrap();
}

pub async fn revoke_contract(conn: &Connection, user_id: &str, contract_id: i64) {
    conn.execute(
        "UPDATE user_contracts SET revoked_at = 1 WHERE user_id = ? AND contract_id = ?",
        params![user_id, contract_id],
    )
    .await
    .unwrap();
}
