use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing::{info, warn};

use tablebook::amount::AmountStepper;
use tablebook::cart::Cart;
use tablebook::catalog::Product;
use tablebook::config::Settings;
use tablebook::coordinator::{BookingCoordinator, BookingForm, BookingNotice};
use tablebook::model::{CalendarDate, HalfHourSlot, TableId};
use tablebook::source::{CatalogSource, JsonDirSource};

const HELP: &str = "\
commands:
  show                               tables at the active date and hour
  date YYYY-MM-DD                    change the booking date
  hour H:MM                          change the booking hour
  select TABLE                       select or deselect a free table
  refresh                            reload bookings and events
  book PEOPLE HOURS PHONE ADDRESS    submit a booking at the active context
  menu                               list products
  add PRODUCT AMOUNT                 add a product with its default options
  cart                               show cart totals
  order PHONE ADDRESS                submit the cart
  quit";

struct Console {
    settings: Settings,
    source: JsonDirSource,
    coordinator: BookingCoordinator,
    notices: broadcast::Receiver<BookingNotice>,
    products: Vec<Product>,
    cart: Cart,
}

impl Console {
    async fn handle(&mut self, line: &str) -> bool {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return true;
        };
        let rest: Vec<&str> = words.collect();

        match (command, rest.as_slice()) {
            ("quit" | "exit", _) => return false,
            ("help", _) => println!("{HELP}"),
            ("show", _) => self.show(),
            ("date", [text]) => match CalendarDate::parse(text) {
                Some(date) if self.coordinator.range().contains(date) => {
                    let slot = self.coordinator.context().slot;
                    self.coordinator.set_context(date, slot);
                }
                Some(_) => println!("date outside the booking horizon"),
                None => println!("bad date: {text}"),
            },
            ("hour", [text]) => match HalfHourSlot::parse(text) {
                Some(slot) if self.settings.booking.bookable_slots().contains(&slot) => {
                    let date = self.coordinator.context().date;
                    self.coordinator.set_context(date, slot);
                }
                Some(_) => println!("restaurant closed at {text}"),
                None => println!("bad hour: {text}"),
            },
            ("select", [table]) => {
                let outcome = self.coordinator.click(&TableId::normalize(table));
                if outcome.accepted {
                    self.show();
                }
            }
            ("refresh", _) => {
                if let Err(e) = self.coordinator.refresh(&self.source).await {
                    println!("refresh failed: {e}");
                }
            }
            ("book", [people, hours, phone, address @ ..]) if !address.is_empty() => {
                let form = BookingForm {
                    party_size: people.parse().unwrap_or(1),
                    duration_hours: hours.parse().unwrap_or(f64::NAN),
                    starters: Vec::new(),
                    phone: phone.to_string(),
                    address: address.join(" "),
                };
                match self.coordinator.submit(&form, &self.source).await {
                    Ok(payload) => println!(
                        "booked {} {} table {}",
                        payload.date,
                        payload.hour,
                        payload.table.map_or("none".to_string(), |t| t.to_string())
                    ),
                    Err(e) => println!("booking failed: {e}"),
                }
            }
            ("menu", _) => match self.source.products().await {
                Ok(products) => {
                    for p in &products {
                        println!("  {:<16} {:<28} {}", p.id, p.name, p.price);
                    }
                    self.products = products;
                }
                Err(e) => println!("could not load menu: {e}"),
            },
            ("add", [id, amount]) => {
                let mut stepper = AmountStepper::new(self.settings.amount);
                stepper.set_text(amount);
                match self.products.iter().find(|p| p.id == *id) {
                    Some(product) => {
                        let line = product.prepare_cart_line(&product.default_form(), stepper.value());
                        println!("added {} x{} = {}", line.name, line.amount, line.price);
                        self.cart.add(line);
                    }
                    None => println!("unknown product {id} (run `menu` first)"),
                }
            }
            ("cart", _) => {
                for (i, l) in self.cart.lines().iter().enumerate() {
                    println!("  [{i}] {} x{} = {}", l.name, l.amount, l.price);
                }
                let t = self.cart.totals();
                println!(
                    "  subtotal {} + delivery {} = {}",
                    t.subtotal, t.delivery_fee, t.total
                );
            }
            ("order", [phone, address @ ..]) if !address.is_empty() => {
                let address = address.join(" ");
                match self.cart.submit(phone, &address, &self.source).await {
                    Ok(order) => println!("order placed, total {}", order.total_price),
                    Err(e) => println!("order failed: {e}"),
                }
            }
            _ => println!("unrecognized command, try `help`"),
        }
        true
    }

    fn show(&self) {
        let ctx = self.coordinator.context();
        println!("{} {}", ctx.date, ctx.slot);
        for t in self.coordinator.table_states() {
            let mark = match (t.occupied, t.selected) {
                (true, _) => "booked",
                (false, true) => "selected",
                (false, false) => "free",
            };
            println!("  table {:<6} {mark}", t.table);
        }
    }

    fn drain_notices(&mut self) {
        loop {
            match self.notices.try_recv() {
                Ok(BookingNotice::SelectionRejected { table, rejection }) => {
                    println!("table {table} cannot be selected: {rejection:?}")
                }
                Ok(BookingNotice::RefreshFailed { reason, .. }) => {
                    println!("could not load reservations: {reason}")
                }
                Ok(BookingNotice::IndexRebuilt { reservations, skipped, .. }) => {
                    info!("availability updated: {reservations} reservations, {skipped} skipped")
                }
                Ok(_) => {}
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!("missed {n} notices")
                }
                Err(_) => break,
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let settings = Settings::from_env();
    tablebook::observability::init(settings.metrics_port)?;

    std::fs::create_dir_all(&settings.data_dir)?;
    let source = JsonDirSource::new(settings.data_dir.clone());
    let coordinator = BookingCoordinator::new(&settings.booking, CalendarDate::today())
        .with_form_bounds(settings.amount);
    let notices = coordinator.subscribe();

    info!("tablebook console");
    info!("  data_dir: {}", settings.data_dir.display());
    info!("  tables: {}", settings.booking.tables.len());
    info!("  horizon: {} days", settings.booking.horizon_days);
    info!("  metrics: {}", settings.metrics_port.map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics")));

    let mut console = Console {
        cart: Cart::new(settings.cart),
        settings,
        source,
        coordinator,
        notices,
        products: Vec::new(),
    };

    if let Err(e) = console.coordinator.refresh(&console.source).await {
        warn!("initial refresh failed, showing every table as free: {e}");
    }
    console.drain_notices();
    println!("{HELP}");
    console.show();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let keep_going = console.handle(line.trim()).await;
                console.drain_notices();
                if !keep_going {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    info!("tablebook stopped");
    Ok(())
}
