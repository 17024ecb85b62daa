//! PostgreSQL schema, applied statement by statement and safe to re-run.

pub const STATEMENTS: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS users (
        id BIGSERIAL PRIMARY KEY,
        username VARCHAR(50) NOT NULL,
        password VARCHAR(255) NOT NULL,
        email VARCHAR(255) NOT NULL,
        role VARCHAR(20) NOT NULL DEFAULT 'editor',
        status BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        CONSTRAINT users_username_key UNIQUE (username),
        CONSTRAINT users_email_key UNIQUE (email),
        CONSTRAINT users_role_check CHECK (role IN ('admin', 'editor'))
    )"#,
    r#"CREATE TABLE IF NOT EXISTS products (
        id BIGSERIAL PRIMARY KEY,
        title VARCHAR(200) NOT NULL,
        cover TEXT NOT NULL,
        description TEXT,
        stars INTEGER NOT NULL DEFAULT 0 CHECK (stars BETWEEN 0 AND 5),
        tags JSONB NOT NULL DEFAULT '[]'::jsonb,
        date DATE NOT NULL DEFAULT CURRENT_DATE,
        images JSONB NOT NULL DEFAULT '[]'::jsonb,
        view_count BIGINT NOT NULL DEFAULT 0,
        status BOOLEAN NOT NULL DEFAULT TRUE,
        featured BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS articles (
        id BIGSERIAL PRIMARY KEY,
        title VARCHAR(200) NOT NULL,
        cover TEXT NOT NULL,
        content TEXT NOT NULL,
        status BOOLEAN NOT NULL DEFAULT TRUE,
        view_count BIGINT NOT NULL DEFAULT 0,
        is_featured BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_products_status_date ON products (status, date DESC)",
    "CREATE INDEX IF NOT EXISTS idx_products_featured ON products (featured)",
    "CREATE INDEX IF NOT EXISTS idx_articles_status_created ON articles (status, created_at DESC)",
];
