// region:    --- Sellers

pub const INSERT_SELLER: &str = r#"
    INSERT INTO sellers (company_name, contact_name, email, phone, password_hash, status, created_at, updated_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
    RETURNING id, company_name, contact_name, email, phone, password_hash, status,
              session_token_hash, session_expires, created_at, updated_at
"#;

pub const GET_SELLER: &str = r#"
    SELECT id, company_name, contact_name, email, phone, password_hash, status,
           session_token_hash, session_expires, created_at, updated_at
    FROM sellers WHERE id = $1
"#;

pub const FIND_SELLER_BY_EMAIL: &str = r#"
    SELECT id, company_name, contact_name, email, phone, password_hash, status,
           session_token_hash, session_expires, created_at, updated_at
    FROM sellers WHERE lower(email) = lower($1)
"#;

pub const FIND_SELLER_BY_SESSION: &str = r#"
    SELECT id, company_name, contact_name, email, phone, password_hash, status,
           session_token_hash, session_expires, created_at, updated_at
    FROM sellers WHERE session_token_hash = $1
"#;

pub const LIST_SELLERS: &str = r#"
    SELECT id, company_name, contact_name, email, phone, password_hash, status,
           session_token_hash, session_expires, created_at, updated_at
    FROM sellers
    WHERE ($1::text IS NULL OR status = $1)
      AND ($2::text IS NULL
           OR company_name ILIKE '%' || $2 || '%'
           OR contact_name ILIKE '%' || $2 || '%'
           OR email ILIKE '%' || $2 || '%')
    ORDER BY company_name, id
    LIMIT $3 OFFSET $4
"#;

pub const UPDATE_SELLER: &str = r#"
    UPDATE sellers
    SET company_name = $2, contact_name = $3, email = $4, phone = $5, password_hash = $6,
        status = $7, session_token_hash = $8, session_expires = $9, updated_at = $10
    WHERE id = $1
    RETURNING id, company_name, contact_name, email, phone, password_hash, status,
              session_token_hash, session_expires, created_at, updated_at
"#;

pub const COUNT_ACTIVE_SALES_FOR_SELLER: &str =
    "SELECT COUNT(*) FROM sales WHERE seller_id = $1 AND status = 'active'";

pub const DELETE_SELLER: &str = "DELETE FROM sellers WHERE id = $1";

pub const SELLER_STATS: &str = r#"
    SELECT
        (SELECT COUNT(*) FROM sales WHERE seller_id = $1) AS total_sales,
        (SELECT COUNT(*) FROM sales WHERE seller_id = $1 AND status = 'active') AS active_sales,
        (SELECT COUNT(*) FROM items i JOIN sales s ON s.id = i.sale_id WHERE s.seller_id = $1) AS total_items,
        (SELECT COUNT(*) FROM offers o
            JOIN items i ON i.id = o.item_id
            JOIN sales s ON s.id = i.sale_id
         WHERE s.seller_id = $1) AS total_offers
"#;

// endregion: --- Sellers

// region:    --- Sales

pub const INSERT_SALE: &str = r#"
    INSERT INTO sales (seller_id, title, description, address, city, state, zip,
                       preview_start, preview_end, claim_start, claim_end, pickup_start, pickup_end,
                       access_code, qr_code, status, show_price_ranges, created_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, 'active', $16, $17)
    RETURNING id, seller_id, title, description, address, city, state, zip,
              preview_start, preview_end, claim_start, claim_end, pickup_start, pickup_end,
              access_code, qr_code, status, show_price_ranges, created_at
"#;

pub const GET_SALE: &str = r#"
    SELECT id, seller_id, title, description, address, city, state, zip,
           preview_start, preview_end, claim_start, claim_end, pickup_start, pickup_end,
           access_code, qr_code, status, show_price_ranges, created_at
    FROM sales WHERE id = $1
"#;

pub const FIND_SALE_BY_ACCESS_CODE: &str = r#"
    SELECT id, seller_id, title, description, address, city, state, zip,
           preview_start, preview_end, claim_start, claim_end, pickup_start, pickup_end,
           access_code, qr_code, status, show_price_ranges, created_at
    FROM sales WHERE access_code = $1
"#;

pub const FIND_SALE_BY_QR_CODE: &str = r#"
    SELECT id, seller_id, title, description, address, city, state, zip,
           preview_start, preview_end, claim_start, claim_end, pickup_start, pickup_end,
           access_code, qr_code, status, show_price_ranges, created_at
    FROM sales WHERE qr_code = $1
"#;

pub const LIST_SALES: &str = r#"
    SELECT id, seller_id, title, description, address, city, state, zip,
           preview_start, preview_end, claim_start, claim_end, pickup_start, pickup_end,
           access_code, qr_code, status, show_price_ranges, created_at
    FROM sales
    WHERE ($1::bigint IS NULL OR seller_id = $1)
      AND ($2::text IS NULL OR status = $2)
      AND ($3::text IS NULL
           OR title ILIKE '%' || $3 || '%'
           OR city ILIKE '%' || $3 || '%'
           OR access_code ILIKE '%' || $3 || '%')
    ORDER BY created_at DESC, id DESC
    LIMIT $4 OFFSET $5
"#;

pub const CURRENT_SALES: &str = r#"
    SELECT id, seller_id, title, description, address, city, state, zip,
           preview_start, preview_end, claim_start, claim_end, pickup_start, pickup_end,
           access_code, qr_code, status, show_price_ranges, created_at
    FROM sales
    WHERE status = 'active' AND claim_start <= $1 AND claim_end >= $1
    ORDER BY claim_end, id
"#;

pub const UPCOMING_SALES: &str = r#"
    SELECT id, seller_id, title, description, address, city, state, zip,
           preview_start, preview_end, claim_start, claim_end, pickup_start, pickup_end,
           access_code, qr_code, status, show_price_ranges, created_at
    FROM sales
    WHERE status = 'active' AND claim_start > $1
    ORDER BY claim_start, id
"#;

pub const UPDATE_SALE: &str = r#"
    UPDATE sales
    SET title = $2, description = $3, address = $4, city = $5, state = $6, zip = $7,
        preview_start = $8, preview_end = $9, claim_start = $10, claim_end = $11,
        pickup_start = $12, pickup_end = $13, access_code = $14, qr_code = $15,
        status = $16, show_price_ranges = $17
    WHERE id = $1
    RETURNING id, seller_id, title, description, address, city, state, zip,
              preview_start, preview_end, claim_start, claim_end, pickup_start, pickup_end,
              access_code, qr_code, status, show_price_ranges, created_at
"#;

pub const DELETE_SALE: &str = "DELETE FROM sales WHERE id = $1";

pub const CLOSE_FINISHED_SALES: &str = r#"
    UPDATE sales SET status = 'closed'
    WHERE status = 'active' AND pickup_end < $1
    RETURNING id
"#;

pub const SALE_STATS: &str = r#"
    SELECT
        (SELECT COUNT(*) FROM items WHERE sale_id = $1) AS total_items,
        (SELECT COUNT(DISTINCT o.item_id) FROM offers o JOIN items i ON i.id = o.item_id WHERE i.sale_id = $1) AS items_with_offers,
        (SELECT COUNT(*) FROM offers o JOIN items i ON i.id = o.item_id WHERE i.sale_id = $1) AS total_offers,
        (SELECT COUNT(*) FROM items WHERE sale_id = $1 AND status = 'claimed') AS claimed_items,
        (SELECT COUNT(DISTINCT o.buyer_id) FROM offers o JOIN items i ON i.id = o.item_id WHERE i.sale_id = $1) AS unique_buyers
"#;

// endregion: --- Sales

// region:    --- Items

pub const INSERT_ITEM: &str = r#"
    INSERT INTO items (sale_id, item_number, title, description, starting_price, offer_increment,
                       buy_now_price, category, condition_rating, status, created_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'available', $10)
    RETURNING id, sale_id, item_number, title, description, starting_price, offer_increment,
              buy_now_price, category, condition_rating, status, winning_offer_id, created_at
"#;

pub const GET_ITEM: &str = r#"
    SELECT id, sale_id, item_number, title, description, starting_price, offer_increment,
           buy_now_price, category, condition_rating, status, winning_offer_id, created_at
    FROM items WHERE id = $1
"#;

/// 상태 전이 전에 상품 행을 잠근다
pub const LOCK_ITEM: &str = r#"
    SELECT id, sale_id, item_number, title, description, starting_price, offer_increment,
           buy_now_price, category, condition_rating, status, winning_offer_id, created_at
    FROM items WHERE id = $1
    FOR UPDATE
"#;

pub const LIST_ITEMS: &str = r#"
    SELECT id, sale_id, item_number, title, description, starting_price, offer_increment,
           buy_now_price, category, condition_rating, status, winning_offer_id, created_at
    FROM items
    WHERE sale_id = $1
      AND ($2::text IS NULL OR status = $2)
      AND ($3::text IS NULL OR lower(category) = lower($3))
      AND ($4::text IS NULL
           OR title ILIKE '%' || $4 || '%'
           OR description ILIKE '%' || $4 || '%'
           OR item_number ILIKE '%' || $4 || '%')
    ORDER BY item_number NULLS LAST, id
"#;

pub const UPDATE_ITEM: &str = r#"
    UPDATE items
    SET item_number = $2, title = $3, description = $4, starting_price = $5, offer_increment = $6,
        buy_now_price = $7, category = $8, condition_rating = $9
    WHERE id = $1
    RETURNING id, sale_id, item_number, title, description, starting_price, offer_increment,
              buy_now_price, category, condition_rating, status, winning_offer_id, created_at
"#;

pub const CLAIM_ITEM: &str =
    "UPDATE items SET status = 'claimed', winning_offer_id = $2 WHERE id = $1";

pub const DELETE_ITEM: &str = "DELETE FROM items WHERE id = $1";

// endregion: --- Items

// region:    --- Buyers

pub const INSERT_BUYER: &str = r#"
    INSERT INTO buyers (sale_id, name, email, phone, auth_method, auth_code_hash, auth_code_expires,
                        failed_attempts, auth_verified, created_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7, 0, FALSE, $8)
    RETURNING id, sale_id, name, email, phone, auth_method, auth_code_hash, auth_code_expires,
              failed_attempts, auth_verified, session_token_hash, session_expires, last_activity, created_at
"#;

pub const GET_BUYER: &str = r#"
    SELECT id, sale_id, name, email, phone, auth_method, auth_code_hash, auth_code_expires,
           failed_attempts, auth_verified, session_token_hash, session_expires, last_activity, created_at
    FROM buyers WHERE id = $1
"#;

pub const FIND_BUYER_BY_EMAIL: &str = r#"
    SELECT id, sale_id, name, email, phone, auth_method, auth_code_hash, auth_code_expires,
           failed_attempts, auth_verified, session_token_hash, session_expires, last_activity, created_at
    FROM buyers WHERE sale_id = $1 AND auth_method = 'email' AND email = $2
"#;

pub const FIND_BUYER_BY_PHONE: &str = r#"
    SELECT id, sale_id, name, email, phone, auth_method, auth_code_hash, auth_code_expires,
           failed_attempts, auth_verified, session_token_hash, session_expires, last_activity, created_at
    FROM buyers WHERE sale_id = $1 AND auth_method = 'sms' AND phone = $2
"#;

pub const FIND_BUYER_BY_SESSION: &str = r#"
    SELECT id, sale_id, name, email, phone, auth_method, auth_code_hash, auth_code_expires,
           failed_attempts, auth_verified, session_token_hash, session_expires, last_activity, created_at
    FROM buyers WHERE session_token_hash = $1
"#;

pub const LIST_BUYERS: &str = r#"
    SELECT id, sale_id, name, email, phone, auth_method, auth_code_hash, auth_code_expires,
           failed_attempts, auth_verified, session_token_hash, session_expires, last_activity, created_at
    FROM buyers
    WHERE ($1::bigint IS NULL OR sale_id = $1)
      AND ($2::boolean IS NULL OR auth_verified = $2)
      AND ($3::text IS NULL
           OR name ILIKE '%' || $3 || '%'
           OR email ILIKE '%' || $3 || '%'
           OR phone ILIKE '%' || $3 || '%')
    ORDER BY created_at DESC, id DESC
    LIMIT $4 OFFSET $5
"#;

pub const LOCK_BUYER: &str = r#"
    SELECT id, sale_id, name, email, phone, auth_method, auth_code_hash, auth_code_expires,
           failed_attempts, auth_verified, session_token_hash, session_expires, last_activity, created_at
    FROM buyers WHERE id = $1
    FOR UPDATE
"#;

pub const ISSUE_BUYER_CODE: &str = r#"
    UPDATE buyers
    SET name = COALESCE($2, name), auth_code_hash = $3, auth_code_expires = $4, failed_attempts = 0
    WHERE id = $1
    RETURNING id, sale_id, name, email, phone, auth_method, auth_code_hash, auth_code_expires,
              failed_attempts, auth_verified, session_token_hash, session_expires, last_activity, created_at
"#;

// LOCK_BUYER 로 잠근 행에만 쓴다
pub const SAVE_CODE_ATTEMPT: &str = r#"
    UPDATE buyers
    SET auth_code_hash = $2, auth_code_expires = $3, failed_attempts = $4, auth_verified = $5,
        session_token_hash = $6, session_expires = $7, last_activity = $8
    WHERE id = $1
"#;

pub const TOUCH_BUYER: &str = "UPDATE buyers SET last_activity = $2 WHERE id = $1";

pub const END_BUYER_SESSION: &str =
    "UPDATE buyers SET session_token_hash = NULL, session_expires = NULL WHERE id = $1";

pub const BUYER_STATS: &str = r#"
    SELECT
        COUNT(*) AS total_offers,
        COUNT(*) FILTER (WHERE status = 'active') AS active_offers,
        COUNT(*) FILTER (WHERE status = 'winning') AS winning_offers
    FROM offers WHERE buyer_id = $1
"#;

pub const COUNT_WINNING_OFFERS_FOR_BUYER: &str =
    "SELECT COUNT(*) FROM offers WHERE buyer_id = $1 AND status = 'winning'";

pub const DELETE_BUYER: &str = "DELETE FROM buyers WHERE id = $1";

pub const CLEAR_EXPIRED_BUYER_SESSIONS: &str = r#"
    UPDATE buyers SET session_token_hash = NULL, session_expires = NULL
    WHERE session_expires IS NOT NULL AND session_expires <= $1
"#;

pub const CLEAR_EXPIRED_SELLER_SESSIONS: &str = r#"
    UPDATE sellers SET session_token_hash = NULL, session_expires = NULL
    WHERE session_expires IS NOT NULL AND session_expires <= $1
"#;

pub const PURGE_UNVERIFIED_BUYERS: &str = r#"
    DELETE FROM buyers b
    WHERE b.auth_verified = FALSE
      AND b.auth_code_expires < $1
      AND NOT EXISTS (SELECT 1 FROM offers o WHERE o.buyer_id = b.id)
"#;

// endregion: --- Buyers

// region:    --- Offers

pub const GET_OFFER: &str = r#"
    SELECT id, item_id, buyer_id, offer_amount, max_offer, status, seller_notes, created_at, updated_at
    FROM offers WHERE id = $1
"#;

pub const GET_OFFER_ITEM_ID: &str = "SELECT item_id FROM offers WHERE id = $1";

pub const FIND_ACTIVE_OFFER_FOR_BUYER: &str = r#"
    SELECT id, item_id, buyer_id, offer_amount, max_offer, status, seller_notes, created_at, updated_at
    FROM offers WHERE item_id = $1 AND buyer_id = $2 AND status = 'active'
"#;

pub const HIGHEST_ACTIVE_OFFER: &str =
    "SELECT MAX(offer_amount) FROM offers WHERE item_id = $1 AND status = 'active'";

pub const ACTIVE_OFFERS_EXCEPT: &str = r#"
    SELECT id, item_id, buyer_id, offer_amount, max_offer, status, seller_notes, created_at, updated_at
    FROM offers WHERE item_id = $1 AND id <> $2 AND status = 'active'
    ORDER BY id
"#;

pub const INSERT_OFFER: &str = r#"
    INSERT INTO offers (item_id, buyer_id, offer_amount, max_offer, status, created_at, updated_at)
    VALUES ($1, $2, $3, $4, 'active', $5, $5)
    RETURNING id, item_id, buyer_id, offer_amount, max_offer, status, seller_notes, created_at, updated_at
"#;

pub const UPDATE_OFFER: &str = r#"
    UPDATE offers
    SET offer_amount = $2, max_offer = $3, status = $4, seller_notes = $5, updated_at = $6
    WHERE id = $1
"#;

pub const DELETE_OFFER: &str = "DELETE FROM offers WHERE id = $1";

pub const INSERT_HISTORY: &str = r#"
    INSERT INTO offer_history (offer_id, item_id, buyer_id, buyer_name, offer_amount, action, created_at)
    SELECT $1, $2, $3, COALESCE((SELECT name FROM buyers WHERE id = $3), ''), $4, $5, $6
"#;

pub const OFFER_HISTORY: &str = r#"
    SELECT id, offer_id, item_id, buyer_id, buyer_name, offer_amount, action, created_at
    FROM offer_history
    WHERE item_id = $1
    ORDER BY created_at DESC, id DESC
"#;

pub const LIST_OFFERS: &str = r#"
    SELECT o.id, o.item_id, o.buyer_id, o.offer_amount, o.max_offer, o.status, o.seller_notes,
           o.created_at, o.updated_at,
           b.name AS buyer_name, i.title AS item_title, i.status AS item_status,
           s.id AS sale_id, s.title AS sale_title
    FROM offers o
    JOIN buyers b ON b.id = o.buyer_id
    JOIN items i ON i.id = o.item_id
    JOIN sales s ON s.id = i.sale_id
    WHERE ($1::text IS NULL OR o.status = $1)
      AND ($2::bigint IS NULL OR s.seller_id = $2)
      AND ($3::text IS NULL
           OR i.title ILIKE '%' || $3 || '%'
           OR b.name ILIKE '%' || $3 || '%'
           OR s.title ILIKE '%' || $3 || '%')
    ORDER BY o.created_at DESC, o.id DESC
    LIMIT $4 OFFSET $5
"#;

pub const OFFERS_FOR_ITEM: &str = r#"
    SELECT o.id, o.item_id, o.buyer_id, o.offer_amount, o.max_offer, o.status, o.seller_notes,
           o.created_at, o.updated_at,
           b.name AS buyer_name, i.title AS item_title, i.status AS item_status,
           s.id AS sale_id, s.title AS sale_title
    FROM offers o
    JOIN buyers b ON b.id = o.buyer_id
    JOIN items i ON i.id = o.item_id
    JOIN sales s ON s.id = i.sale_id
    WHERE o.item_id = $1
    ORDER BY o.offer_amount DESC, o.created_at, o.id
"#;

pub const OFFERS_FOR_BUYER: &str = r#"
    SELECT o.id, o.item_id, o.buyer_id, o.offer_amount, o.max_offer, o.status, o.seller_notes,
           o.created_at, o.updated_at,
           b.name AS buyer_name, i.title AS item_title, i.status AS item_status,
           s.id AS sale_id, s.title AS sale_title
    FROM offers o
    JOIN buyers b ON b.id = o.buyer_id
    JOIN items i ON i.id = o.item_id
    JOIN sales s ON s.id = i.sale_id
    WHERE o.buyer_id = $1 AND ($2::text IS NULL OR o.status = $2)
    ORDER BY o.created_at DESC, o.id DESC
"#;

pub const OFFER_SUMMARY: &str = r#"
    SELECT COUNT(*) AS offer_count,
           COUNT(DISTINCT buyer_id) AS unique_buyers,
           MIN(offer_amount) AS min_offer,
           MAX(offer_amount) AS max_offer
    FROM offers
    WHERE item_id = $1 AND status = 'active'
"#;

pub const STALE_OFFERS: &str = r#"
    SELECT id FROM offers
    WHERE status = 'active' AND created_at < $1
    ORDER BY id
"#;

// endregion: --- Offers

// region:    --- Notifications

pub const INSERT_NOTIFICATION: &str = r#"
    INSERT INTO seller_notifications (seller_id, sale_id, kind, title, message, is_read, created_at)
    VALUES ($1, $2, $3, $4, $5, FALSE, $6)
    RETURNING id, seller_id, sale_id, kind, title, message, is_read, created_at
"#;

pub const LIST_NOTIFICATIONS: &str = r#"
    SELECT id, seller_id, sale_id, kind, title, message, is_read, created_at
    FROM seller_notifications
    WHERE ($1::bigint IS NULL OR seller_id = $1)
      AND ($2 = FALSE OR is_read = FALSE)
    ORDER BY created_at DESC, id DESC
"#;

pub const MARK_NOTIFICATION_READ: &str = r#"
    UPDATE seller_notifications SET is_read = TRUE
    WHERE id = $1 AND ($2::bigint IS NULL OR seller_id = $2)
"#;

// endregion: --- Notifications
