//! Keyword arguments are matched by name, positional ones by position.

use fnmemo::{args, Args, CallError, Memoized};

fn main() {
    let mut fmt_price = Memoized::named("fmt_price", |args: &Args| {
        let cents = *args.get::<u64>(0).unwrap_or(&0);
        let symbol = args.get_kw::<&str>("symbol").copied().unwrap_or("$");
        let sep = args.get_kw::<char>("sep").copied().unwrap_or('.');
        println!("formatting {} cents", cents);
        format!("{}{}{}{:02}", symbol, cents / 100, sep, cents % 100)
    });

    // Runs once; the second call hits despite the different keyword order.
    println!("{:?}", fmt_price.call(args!(1999_u64; symbol = "€", sep = ',')));
    println!("{:?}", fmt_price.call(args!(1999_u64; sep = ',', symbol = "€")));

    // A repeated keyword is rejected before the function runs.
    let bad = Args::new().arg(5_u64).kwarg("sep", ',').kwarg("sep", '.');
    println!("{:?}", fmt_price.call(bad));

    let mut checked_div = Memoized::named_fallible("checked_div", |args: &Args| {
        let a = *args.get::<i32>(0).unwrap_or(&0);
        let b = *args.get::<i32>(1).unwrap_or(&0);
        a.checked_div(b).ok_or("division by zero")
    });

    for _ in 0..2 {
        match checked_div.try_call(args!(1, 0)) {
            Ok(q) => println!("quotient {}", q),
            Err(CallError::Failed(reason)) => println!("failed: {}", reason),
            Err(CallError::InvalidKey(err)) => println!("bad arguments: {}", err),
        }
    }
    println!("attempts: {}", checked_div.metrics().misses());
}
